//! Back-office endpoints. Every handler requires an [`AdminUser`].

use std::cmp::Reverse;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use aroma_core::cashback::BonusInput;
use aroma_core::coupon::NewCoupon;
use aroma_core::forecast::{forecast_demand, DemandForecast, ForecastParams};
use aroma_core::tier::TierInput;
use aroma_core::{CashbackBonus, Coupon, CustomerTier, Money, Order, OrderStatus, Partner};
use aroma_db::repository::partner::NewPartner;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::AppState;

// =============================================================================
// Coupons
// =============================================================================

/// `GET /api/admin/coupons`
pub async fn list_coupons(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(state.db.coupons().list().await?))
}

/// `POST /api/admin/coupons`
pub async fn create_coupon(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<NewCoupon>,
) -> ApiResult<(StatusCode, Json<Coupon>)> {
    let coupon = state.db.coupons().insert(input).await?;
    info!(code = %coupon.code, admin = %admin.customer_id, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// `PUT /api/admin/coupons/{code}/active`
pub async fn set_coupon_active(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(code): Path<String>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<Json<Coupon>> {
    Ok(Json(state.db.coupons().set_active(&code, request.active).await?))
}

// =============================================================================
// Tiers & Bonuses
// =============================================================================

/// `GET /api/admin/tiers`
pub async fn list_tiers(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<CustomerTier>>> {
    Ok(Json(state.db.loyalty_program().list_tiers().await?))
}

/// `PUT /api/admin/tiers`
pub async fn upsert_tier(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<TierInput>,
) -> ApiResult<Json<CustomerTier>> {
    input.validate()?;
    Ok(Json(state.db.loyalty_program().upsert_tier(&input).await?))
}

/// `GET /api/admin/bonuses`
pub async fn list_bonuses(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<CashbackBonus>>> {
    Ok(Json(state.db.loyalty_program().list_bonuses().await?))
}

/// `PUT /api/admin/bonuses`
pub async fn upsert_bonus(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<BonusInput>,
) -> ApiResult<Json<CashbackBonus>> {
    input.validate()?;
    Ok(Json(state.db.loyalty_program().upsert_bonus(&input).await?))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// `POST /api/admin/orders/{id}/status`
pub async fn set_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Order>> {
    let to: OrderStatus = request.status.parse()?;
    let order = state.db.orders().transition(&id, to, Utc::now()).await?;

    info!(order_id = %order.id, status = %to, admin = %admin.customer_id, "Order status changed");
    Ok(Json(order))
}

// =============================================================================
// Partners
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSummary {
    #[serde(flatten)]
    pub partner: Partner,
    pub commission_total: Money,
}

/// `GET /api/admin/partners`
pub async fn list_partners(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<PartnerSummary>>> {
    let partners = state.db.partners().list().await?;

    let mut summaries = Vec::with_capacity(partners.len());
    for partner in partners {
        let commission_total = state.db.partners().commission_total(&partner.id).await?;
        summaries.push(PartnerSummary {
            partner,
            commission_total,
        });
    }

    Ok(Json(summaries))
}

/// `POST /api/admin/partners`
pub async fn create_partner(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<NewPartner>,
) -> ApiResult<(StatusCode, Json<Partner>)> {
    let partner = state.db.partners().insert(input).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

// =============================================================================
// Inventory Forecast
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastQuery {
    pub lookback_days: Option<i64>,
    pub lead_time_days: Option<i64>,
    pub safety_days: Option<i64>,
}

impl ForecastQuery {
    fn params(&self) -> ForecastParams {
        let defaults = ForecastParams::default();
        ForecastParams {
            lookback_days: self.lookback_days.unwrap_or(defaults.lookback_days),
            lead_time_days: self.lead_time_days.unwrap_or(defaults.lead_time_days),
            safety_days: self.safety_days.unwrap_or(defaults.safety_days),
        }
    }
}

/// `GET /api/admin/inventory/forecast`
///
/// At-risk products first, then by days of cover (soonest first).
pub async fn inventory_forecast(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<Json<Vec<DemandForecast>>> {
    let params = query.params();
    params.validate()?;

    let cutoff = Utc::now() - Duration::days(params.lookback_days);
    let sales = state.db.orders().units_sold_since(cutoff).await?;

    let mut forecasts: Vec<DemandForecast> = sales
        .iter()
        .map(|s| forecast_demand(&s.product_id, &s.sku, s.stock, s.units_sold, &params))
        .collect();

    forecasts.sort_by_key(|f| (Reverse(f.at_risk), f.days_of_cover.unwrap_or(i64::MAX)));

    Ok(Json(forecasts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_query_fills_defaults() {
        let params = ForecastQuery {
            lookback_days: Some(7),
            ..Default::default()
        }
        .params();

        assert_eq!(params.lookback_days, 7);
        assert_eq!(params.lead_time_days, ForecastParams::default().lead_time_days);
    }
}
