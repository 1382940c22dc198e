//! # Aroma Storefront API
//!
//! REST service for the perfume storefront and its back-office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API                                   │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Catalog       │  │  Checkout      │  │  Loyalty                   ││
//! │  │ • search       │  │ • quote        │  │ • summary                  ││
//! │  │ • detail       │  │ • place order  │  │ • ledger                   ││
//! │  │ • recently     │  │ • history      │  │ • preferences              ││
//! │  │   viewed       │  │                │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────────────────────────────────────┐│
//! │  │  Public        │  │  Admin                                         ││
//! │  │ • coupons      │  │ • coupons • tiers • bonuses • order status     ││
//! │  │ • newsletter   │  │ • partners • inventory forecast                ││
//! │  │ (origin+rate)  │  │                                                ││
//! │  └────────────────┘  └────────────────────────────────────────────────┘│
//! │                                                                         │
//! │                     aroma-db (SQLite) ◄── aroma-core                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, catalog, health, loyalty, orders, public};
pub use crate::state::AppState;

/// Builds the full HTTP router.
pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/api/coupons/validate", post(public::validate_coupon))
        .route("/api/newsletter", post(public::subscribe_newsletter))
        .route_layer(middleware::from_fn_with_state(state.clone(), public::guard));

    let storefront = Router::new()
        .route("/health", get(health::health))
        .route("/api/products", get(catalog::search_products))
        .route("/api/products/{id}", get(catalog::get_product))
        .route("/api/products/{id}/view", post(catalog::record_view))
        .route("/api/recently-viewed", get(catalog::recently_viewed))
        .route("/api/loyalty", get(loyalty::summary).put(loyalty::update_preferences))
        .route("/api/loyalty/ledger", get(loyalty::ledger))
        .route("/api/checkout/quote", post(orders::quote))
        .route("/api/orders", get(orders::list).post(orders::place));

    let back_office = Router::new()
        .route("/api/admin/coupons", get(admin::list_coupons).post(admin::create_coupon))
        .route("/api/admin/coupons/{code}/active", put(admin::set_coupon_active))
        .route("/api/admin/tiers", get(admin::list_tiers).put(admin::upsert_tier))
        .route("/api/admin/bonuses", get(admin::list_bonuses).put(admin::upsert_bonus))
        .route("/api/admin/orders/{id}/status", post(admin::set_order_status))
        .route("/api/admin/partners", get(admin::list_partners).post(admin::create_partner))
        .route("/api/admin/inventory/forecast", get(admin::inventory_forecast));

    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .merge(guarded)
        .merge(storefront)
        .merge(back_office)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::ApiConfig;
    use aroma_core::coupon::NewCoupon;
    use aroma_core::{DiscountType, Product};
    use aroma_db::{Database, DbConfig};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use chrono::{NaiveDate, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn setup(config: ApiConfig) -> (Router, AppState) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, config);
        (router(state.clone()), state)
    }

    fn token(state: &AppState, customer: &str, role: Role) -> String {
        format!("Bearer {}", state.jwt.issue(customer, role).unwrap())
    }

    fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn add_perfume(state: &AppState, sku: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("{sku} Eau de Parfum"),
            brand: "Maison Kael".to_string(),
            description: None,
            volume_ml: Some(50),
            price_cents,
            sale_price_cents: None,
            cashback_bps: 500,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.db.products().insert(&product).await.unwrap();
        product
    }

    async fn add_save20(state: &AppState) {
        state
            .db
            .coupons()
            .insert(NewCoupon {
                code: "SAVE20".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: 2000,
                min_order_amount_cents: 0,
                max_uses: None,
                valid_from: None,
                valid_until: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup(ApiConfig::default()).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["database"], true);
    }

    #[tokio::test]
    async fn test_session_required() {
        let (app, state) = setup(ApiConfig::default()).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/loyalty").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "unauthorized");

        let customer = token(&state, "ana", Role::Customer);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/admin/tiers")
                    .header(header::AUTHORIZATION, customer)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_validate_coupon() {
        let (app, state) = setup(ApiConfig::default()).await;
        add_save20(&state).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/coupons/validate",
                None,
                json!({ "code": "save20", "orderAmountCents": 10000 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["discountType"], "percentage");
        assert_eq!(body["discountValue"], 2000);
        assert_eq!(body["discountCents"], 2000);
        assert_eq!(body["finalAmountCents"], 8000);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/coupons/validate",
                None,
                json!({ "code": "NOPE", "orderAmountCents": 10000 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "coupon_not_found");
    }

    #[tokio::test]
    async fn test_public_endpoints_are_rate_limited() {
        let config = ApiConfig {
            rate_limit_max: 2,
            ..Default::default()
        };
        let (app, _) = setup(config).await;

        for email in ["a@example.com", "b@example.com"] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/newsletter", None, json!({ "email": email })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/newsletter",
                None,
                json!({ "email": "c@example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_origin_allowlist() {
        let config = ApiConfig {
            allowed_origins: vec!["https://shop.example".to_string()],
            ..Default::default()
        };
        let (app, _) = setup(config).await;

        let mut request = json_request("POST", "/api/newsletter", None, json!({ "email": "a@example.com" }));
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://evil.example"));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let mut request = json_request("POST", "/api/newsletter", None, json!({ "email": "a@example.com" }));
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://shop.example"));
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_checkout_and_fulfilment() {
        let (app, state) = setup(ApiConfig::default()).await;
        let product = add_perfume(&state, "MKL-NOIR-50", 10000, 5).await;
        add_save20(&state).await;

        let customer = token(&state, "ana", Role::Customer);
        let admin = token(&state, "ops", Role::Admin);
        let cart = json!({
            "items": [{ "productId": product.id, "quantity": 1 }],
            "couponCode": "SAVE20"
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/checkout/quote", Some(&customer), cart.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let quote = body_json(response).await;
        assert_eq!(quote["quote"]["total"], 8000);
        assert_eq!(quote["tier"]["tierName"], "Bronze");

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/orders", Some(&customer), cart))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let order = body_json(response).await;
        assert_eq!(order["status"], "pending_payment");
        let order_id = order["id"].as_str().unwrap().to_string();

        for status in ["paid", "processing", "shipped", "delivered"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/api/admin/orders/{order_id}/status"),
                    Some(&admin),
                    json!({ "status": status }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "transition to {status}");
        }

        // Delivered orders cannot move again.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/admin/orders/{order_id}/status"),
                Some(&admin),
                json!({ "status": "cancelled" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/loyalty")
                    .header(header::AUTHORIZATION, &customer)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let summary = body_json(response).await;
        assert_eq!(summary["account"]["totalSpentCents"], 8000);
        assert_eq!(summary["account"]["cashbackBalanceCents"], 400);
    }

    #[tokio::test]
    async fn test_quote_rejects_unknown_product() {
        let (app, state) = setup(ApiConfig::default()).await;
        let customer = token(&state, "ana", Role::Customer);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/checkout/quote",
                Some(&customer),
                json!({ "items": [{ "productId": "missing", "quantity": 1 }] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_birthday_cannot_be_changed_once_set() {
        let (app, state) = setup(ApiConfig::default()).await;
        let customer = token(&state, "ana", Role::Customer);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/loyalty",
                Some(&customer),
                json!({ "birthday": "1990-07-14" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["birthday"], "1990-07-14");

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/loyalty",
                Some(&customer),
                json!({ "birthday": "1990-10-19" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "birthday_locked");

        let account = state.db.loyalty().get("ana").await.unwrap().unwrap();
        assert_eq!(account.birthday, NaiveDate::from_ymd_opt(1990, 7, 14));
    }
}
