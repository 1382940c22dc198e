//! Checkout and order history for the signed-in customer.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use aroma_core::Order;
use aroma_db::OrderWithItems;

use crate::auth::AuthUser;
use crate::checkout::{self, Checkout, CheckoutRequest};
use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /api/checkout/quote`
pub async fn quote(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<Checkout>> {
    let checkout = checkout::price_checkout(&state, &user.customer_id, &request, Utc::now()).await?;
    Ok(Json(checkout))
}

/// `POST /api/orders`
pub async fn place(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<OrderWithItems>)> {
    let order = checkout::place_order(&state, &user.customer_id, &request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

/// `GET /api/orders?limit=`
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Order>>> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    Ok(Json(state.db.orders().list_for_customer(&user.customer_id, limit).await?))
}
