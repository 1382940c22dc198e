//! Loyalty endpoints for the signed-in customer.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use aroma_core::cashback::{aggregate_cashback, CashbackBreakdown};
use aroma_core::pricing::TierBenefit;
use aroma_core::tier::{next_tier, resolve_tier, NextTier, ResolvedTier};
use aroma_core::{LedgerEntry, LoyaltyAccount, Money, Percent, DEFAULT_BASE_CASHBACK_BPS};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LEDGER_LIMIT: u32 = 50;
const MAX_LEDGER_LIMIT: u32 = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltySummary {
    pub account: LoyaltyAccount,
    pub tier: ResolvedTier,
    pub next_tier: Option<NextTier>,
    /// Rate a product at the default base cashback would earn today.
    pub cashback: CashbackBreakdown,
    pub redeemable_discount: Money,
}

/// `GET /api/loyalty`
pub async fn summary(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<LoyaltySummary>> {
    let today = Utc::now().date_naive();
    let account = state.db.loyalty().get_or_create(&user.customer_id, today).await?;
    let tiers = state.db.loyalty_program().list_tiers().await?;
    let bonuses = state.db.loyalty_program().active_bonuses().await?;

    let policy = state.config.pricing_policy();
    let tier = resolve_tier(&tiers, account.total_spent());
    let tier_cashback = match policy.tier_benefit {
        TierBenefit::Cashback => tier.bonus,
        TierBenefit::Discount => Percent::zero(),
    };

    let cashback = aggregate_cashback(
        Percent::from_bps(DEFAULT_BASE_CASHBACK_BPS),
        tier_cashback,
        &bonuses,
        &account.applicable_bonuses(today, false),
        policy.cashback_cap,
    );

    Ok(Json(LoyaltySummary {
        next_tier: next_tier(&tiers, account.total_spent()),
        redeemable_discount: account.redeemable_discount(),
        tier,
        cashback,
        account,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
    pub limit: Option<u32>,
}

/// `GET /api/loyalty/ledger?limit=`
pub async fn ledger(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<LedgerParams>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEDGER_LIMIT)
        .clamp(1, MAX_LEDGER_LIMIT);

    Ok(Json(state.db.loyalty().ledger(&user.customer_id, limit).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub auto_redeem_points: Option<bool>,
}

/// `PUT /api/loyalty`
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<PreferencesRequest>,
) -> ApiResult<Json<LoyaltyAccount>> {
    let account = state
        .db
        .loyalty()
        .update_preferences(
            &user.customer_id,
            request.birthday,
            request.auto_redeem_points,
            Utc::now().date_naive(),
        )
        .await?;

    Ok(Json(account))
}
