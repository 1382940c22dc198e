//! Public endpoints that reach the database without a session.
//!
//! Both sit behind [`guard`]: the `Origin` header must be on the allowlist
//! and each client gets a limited number of calls per window.
//!
//! ```text
//! request ──► guard ──► Origin allowed? ──no──► 403
//!               │
//!               └──► rate limiter ──over──► 429 + Retry-After
//!                        │
//!                        ▼
//!                     handler
//! ```

use axum::extract::{Request, State};
use axum::http::header::ORIGIN;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use aroma_core::{DiscountType, Money};

use crate::auth::MaybeAuthUser;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::client_key;
use crate::state::AppState;

/// Origin allowlist and rate limit for the public endpoints.
pub async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    if !state.config.allowed_origins.is_empty() {
        let origin = parts.headers.get(ORIGIN).and_then(|v| v.to_str().ok());
        match origin {
            Some(origin) if state.config.is_origin_allowed(origin) => {}
            other => {
                warn!(origin = ?other, path = %parts.uri.path(), "Origin rejected");
                return Err(ApiError::Forbidden("Origin not allowed".to_string()));
            }
        }
    }

    let key = client_key(&parts);
    state.limiter.check(&key).await?;

    Ok(next.run(Request::from_parts(parts, body)).await)
}

// =============================================================================
// Coupon Validation
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_amount_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage coupons, cents for fixed coupons.
    pub discount_value: i64,
    pub discount_cents: i64,
    pub final_amount_cents: i64,
}

/// `POST /api/coupons/validate`
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> ApiResult<Json<ValidateCouponResponse>> {
    aroma_core::validation::validate_order_amount(request.order_amount_cents)?;
    let amount = Money::from_cents(request.order_amount_cents);

    let discount = state
        .db
        .coupons()
        .validate(&request.code, amount, Utc::now())
        .await?;

    Ok(Json(ValidateCouponResponse {
        valid: true,
        final_amount_cents: (amount - discount.discount).cents(),
        discount_cents: discount.discount.cents(),
        code: discount.code,
        discount_type: discount.discount_type,
        discount_value: discount.discount_value,
    }))
}

// =============================================================================
// Newsletter
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterResponse {
    pub subscribed: bool,
    pub email: String,
}

/// `POST /api/newsletter`
///
/// A signed-in caller also gets the newsletter cashback bonus.
pub async fn subscribe_newsletter(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Json(request): Json<NewsletterRequest>,
) -> ApiResult<(StatusCode, Json<NewsletterResponse>)> {
    let subscriber = state
        .db
        .newsletter()
        .subscribe(
            &request.email,
            user.as_ref().map(|u| u.customer_id.as_str()),
            Utc::now().date_naive(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(NewsletterResponse {
            subscribed: true,
            email: subscriber.email,
        }),
    ))
}
