//! # Price Calculator
//!
//! Combines the coupon validator, tier resolver and cashback aggregator
//! into the price the customer sees and what they will earn.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal                                                   100.00      │
//! │    - coupon discount (validated on subtotal)                -20.00      │
//! │    - tier discount   (TierBenefit::Discount only)            -0.00      │
//! │    ══ discounts clamped to subtotal                                     │
//! │  after discounts                                             80.00      │
//! │    - points          (whole units, ≤ remaining)              -5.00      │
//! │  total                                                       75.00      │
//! │                                                                         │
//! │  cashback = total × (base + tier* + bonuses)   * TierBenefit::Cashback  │
//! │  points earned = floor(total) × 10                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tier percentage is applied either as extra cashback or as a direct
//! discount, never both. Cashback and points are credited on delivery, not
//! here.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ts_rs::TS;

use crate::cashback::{aggregate_cashback, points_for_discount, points_for_spend, points_value, CashbackBreakdown};
use crate::coupon::CouponDiscount;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::tier::ResolvedTier;
use crate::types::{BonusType, CashbackBonus, Percent};
use crate::POINTS_PER_REDEEMABLE_UNIT;

// =============================================================================
// Policy
// =============================================================================

/// How the customer's tier percentage benefits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TierBenefit {
    /// Added to the cashback rate.
    #[default]
    Cashback,
    /// Taken off the price.
    Discount,
}

impl FromStr for TierBenefit {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cashback" => Ok(TierBenefit::Cashback),
            "discount" => Ok(TierBenefit::Discount),
            _ => Err(crate::ValidationError::NotAllowed {
                field: "tierBenefit".to_string(),
                allowed: vec!["cashback".to_string(), "discount".to_string()],
            }),
        }
    }
}

/// Store-wide pricing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PricingPolicy {
    pub tier_benefit: TierBenefit,
    /// Upper bound on the total cashback rate; `None` is uncapped.
    pub cashback_cap: Option<Percent>,
}

// =============================================================================
// Request / Quote
// =============================================================================

/// How many loyalty points to spend on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointsRedemption {
    #[default]
    None,
    /// As many as the balance and the price allow.
    Max,
    /// Exactly this many (a multiple of 100), reduced if the price is lower.
    Exact(i64),
}

/// Everything the calculator needs; all lookups are done by the caller.
#[derive(Debug, Clone)]
pub struct PriceRequest<'a> {
    pub subtotal: Money,
    /// Order base cashback (see [`crate::order::OrderDraft::base_cashback`]).
    pub base_cashback: Percent,
    pub coupon: Option<&'a CouponDiscount>,
    pub tier: &'a ResolvedTier,
    pub bonuses: &'a [CashbackBonus],
    pub applicable_bonuses: &'a [BonusType],
    pub points_balance: i64,
    pub redemption: PointsRedemption,
}

/// Customer-visible price and the rewards it will earn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub subtotal: Money,
    pub coupon_code: Option<String>,
    pub coupon_discount: Money,
    pub tier_name: String,
    pub tier_discount: Money,
    pub points_redeemed: i64,
    pub points_discount: Money,
    /// What the customer pays.
    pub total: Money,
    pub cashback: CashbackBreakdown,
    /// Cashback credited on delivery.
    pub cashback_amount: Money,
    /// Purchase points credited on delivery.
    pub points_earned: i64,
}

impl PriceQuote {
    pub fn total_discount(&self) -> Money {
        self.coupon_discount + self.tier_discount + self.points_discount
    }
}

/// Prices an order.
///
/// ## Errors
/// - `InsufficientPoints` when an exact redemption exceeds the balance
/// - `Validation` when an exact redemption is not a positive multiple of 100
pub fn calculate_price(request: &PriceRequest<'_>, policy: &PricingPolicy) -> CoreResult<PriceQuote> {
    let subtotal = request.subtotal.clamp_non_negative();

    // Discounts
    let coupon_discount = request.coupon.map(|c| c.discount).unwrap_or_default();
    let tier_discount = match policy.tier_benefit {
        TierBenefit::Discount => subtotal.percentage(request.tier.bonus),
        TierBenefit::Cashback => Money::zero(),
    };

    // Coupon first; the tier discount only takes what is left.
    let coupon_discount = coupon_discount.clamp_non_negative().min(subtotal);
    let tier_discount = tier_discount.min(subtotal - coupon_discount);
    let after_discounts = subtotal - coupon_discount - tier_discount;

    // Points
    let points_redeemed = points_to_redeem(
        request.redemption,
        request.points_balance,
        after_discounts,
    )?;
    let points_discount = points_value(points_redeemed);
    let total = (after_discounts - points_discount).clamp_non_negative();

    // Rewards
    let tier_cashback = match policy.tier_benefit {
        TierBenefit::Cashback => request.tier.bonus,
        TierBenefit::Discount => Percent::zero(),
    };
    let cashback = aggregate_cashback(
        request.base_cashback,
        tier_cashback,
        request.bonuses,
        request.applicable_bonuses,
        policy.cashback_cap,
    );
    let cashback_amount = cashback.cashback_on(total);

    Ok(PriceQuote {
        subtotal,
        coupon_code: request.coupon.map(|c| c.code.clone()),
        coupon_discount,
        tier_name: request.tier.tier_name.clone(),
        tier_discount,
        points_redeemed,
        points_discount,
        total,
        cashback,
        cashback_amount,
        points_earned: points_for_spend(total),
    })
}

fn points_to_redeem(redemption: PointsRedemption, balance: i64, price: Money) -> CoreResult<i64> {
    let price_limit = points_for_discount(price);

    match redemption {
        PointsRedemption::None => Ok(0),
        PointsRedemption::Max => {
            let usable = balance.max(0) / POINTS_PER_REDEEMABLE_UNIT * POINTS_PER_REDEEMABLE_UNIT;
            Ok(usable.min(price_limit))
        }
        PointsRedemption::Exact(points) => {
            if points <= 0 || points % POINTS_PER_REDEEMABLE_UNIT != 0 {
                return Err(crate::ValidationError::InvalidFormat {
                    field: "pointsToRedeem".to_string(),
                    reason: format!("must be a positive multiple of {}", POINTS_PER_REDEEMABLE_UNIT),
                }
                .into());
            }
            if points > balance {
                return Err(CoreError::InsufficientPoints {
                    available: balance,
                    requested: points,
                });
            }
            Ok(points.min(price_limit))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
