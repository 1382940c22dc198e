//! # Checkout Service
//!
//! Gathers everything the price calculator needs and runs it.
//!
//! ```text
//! cart items ──► OrderDraft (stock, limits)
//!                   │
//!                   ├── coupon code   ──► CouponRepository::validate
//!                   ├── account       ──► total_spent ──► resolve_tier
//!                   ├── bonuses       ──► newsletter / birthday / anniversary
//!                   ├── referral code ──► active partner? ──► referral bonus
//!                   └── points        ──► explicit, or auto-redeem setting
//!                   │
//!                   ▼
//!             calculate_price ──► PriceQuote
//! ```
//!
//! Quoting is read-only apart from opening the loyalty account on first use.
//! Placing an order re-runs the whole quote so the stored prices never come
//! from the client.

use aroma_core::order::{OrderDraft, OrderLine};
use aroma_core::pricing::{calculate_price, PointsRedemption, PriceQuote, PriceRequest};
use aroma_core::tier::{next_tier, resolve_tier, NextTier, ResolvedTier};
use aroma_core::{CoreError, ValidationError};
use aroma_db::NewOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// A product and quantity in the cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Body of `/api/checkout/quote` and `/api/orders`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
    /// Points to spend. `0` spends none; omitted follows the account's
    /// auto-redeem setting.
    #[serde(default)]
    pub redeem_points: Option<i64>,
}

/// A priced cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub lines: Vec<OrderLine>,
    pub quote: PriceQuote,
    pub tier: ResolvedTier,
    pub next_tier: Option<NextTier>,
    /// Normalized code of the referring partner.
    pub referral_code: Option<String>,
}

impl Checkout {
    /// Turns the priced cart into an order for `customer_id`.
    pub fn into_order(self, customer_id: &str, now: DateTime<Utc>) -> NewOrder {
        NewOrder::new(
            customer_id,
            self.lines,
            self.quote,
            self.referral_code,
            now.date_naive(),
        )
    }
}

/// Prices `request` for `customer_id` as of `now`.
pub async fn price_checkout(
    state: &AppState,
    customer_id: &str,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> ApiResult<Checkout> {
    let db = &state.db;
    let today = now.date_naive();

    if request.items.is_empty() {
        return Err(CoreError::EmptyOrder.into());
    }

    let mut draft = OrderDraft::new();
    for item in &request.items {
        let product = db
            .products()
            .get_by_id(&item.product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;
        draft.add_item(&product, item.quantity)?;
    }
    let subtotal = draft.subtotal();

    let coupon = match request.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(db.coupons().validate(code, subtotal, now).await?),
        _ => None,
    };

    let partner = match request.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            db.partners()
                .get_active_by_code(code)
                .await?
                .ok_or_else(|| ValidationError::InvalidFormat {
                    field: "referralCode".to_string(),
                    reason: "unknown referral code".to_string(),
                })?,
        ),
        _ => None,
    };

    let account = db.loyalty().get_or_create(customer_id, today).await?;
    let tiers = db.loyalty_program().list_tiers().await?;
    let bonuses = db.loyalty_program().active_bonuses().await?;

    let tier = resolve_tier(&tiers, account.total_spent());
    let applicable = account.applicable_bonuses(today, partner.is_some());

    let redemption = match request.redeem_points {
        Some(0) => PointsRedemption::None,
        Some(points) if points < 0 => {
            return Err(ValidationError::MustBePositive {
                field: "redeemPoints".to_string(),
            }
            .into())
        }
        Some(points) => PointsRedemption::Exact(points),
        None if account.auto_redeem_points => PointsRedemption::Max,
        None => PointsRedemption::None,
    };

    let quote = calculate_price(
        &PriceRequest {
            subtotal,
            base_cashback: draft.base_cashback(),
            coupon: coupon.as_ref(),
            tier: &tier,
            bonuses: &bonuses,
            applicable_bonuses: &applicable,
            points_balance: account.points_balance,
            redemption,
        },
        &state.config.pricing_policy(),
    )?;

    debug!(
        customer_id = %customer_id,
        subtotal = %quote.subtotal,
        total = %quote.total,
        cashback = %quote.cashback.total,
        "Checkout priced"
    );

    Ok(Checkout {
        lines: draft.lines,
        next_tier: next_tier(&tiers, account.total_spent()),
        tier,
        quote,
        referral_code: partner.map(|p| p.referral_code),
    })
}

/// Prices and places an order.
pub async fn place_order(
    state: &AppState,
    customer_id: &str,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> ApiResult<aroma_db::OrderWithItems> {
    let checkout = price_checkout(state, customer_id, request, now).await?;
    let order = checkout.into_order(customer_id, now);

    state.db.orders().place(order).await.map_err(ApiError::from)
}
