//! # Coupon Validator
//!
//! Decides whether a coupon applies to an order amount and how much it
//! takes off.
//!
//! ## Validation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "save20", 10000                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  normalize_coupon_code ──► "SAVE20"   (or ValidationError)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  repository lookup (aroma-db) ──► Option<Coupon>                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_coupon ◄── THIS MODULE                                        │
//! │       ├── absent / inactive      → NotFound                             │
//! │       ├── now < valid_from       → NotYetValid                          │
//! │       ├── now > valid_until      → Expired                              │
//! │       ├── amount < minimum       → BelowMinimum                         │
//! │       ├── uses ≥ max_uses        → UsageExceeded                        │
//! │       └── OK → CouponDiscount { discount ≤ amount }                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The usage counter is NOT touched here. Redemption happens once, when the
//! order is paid, inside a database transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, CouponError};
use crate::money::Money;
use crate::types::{Coupon, DiscountType, Percent};
use crate::validation::{normalize_coupon_code, validate_amount_cents, validate_bps};

/// The outcome of a successful coupon validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CouponDiscount {
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage coupons, cents for fixed coupons.
    pub discount_value: i64,
    /// Amount taken off the order (never more than the order amount).
    pub discount: Money,
}

/// Computes the discount a coupon grants on `order_amount`.
///
/// - percentage: `order_amount × bps / 10000`, rounded half up
/// - fixed: `min(value, order_amount)`
///
/// The result is always within `0..=order_amount`.
pub fn compute_discount(coupon: &Coupon, order_amount: Money) -> Money {
    let amount = order_amount.clamp_non_negative();
    let value = coupon.discount_value.max(0);

    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let bps = u32::try_from(value).unwrap_or(u32::MAX);
            amount.percentage(Percent::from_bps(bps))
        }
        DiscountType::Fixed => Money::from_cents(value),
    };

    raw.min(amount)
}

/// Validates a looked-up coupon against an order amount at instant `now`.
///
/// ## Arguments
/// * `code` - The normalized code the customer entered (used in errors)
/// * `coupon` - The coupon found for that code, if any
/// * `order_amount` - Order amount in cents
/// * `now` - Current instant (passed in; this crate never reads the clock)
pub fn validate_coupon(
    code: &str,
    coupon: Option<&Coupon>,
    order_amount: Money,
    now: DateTime<Utc>,
) -> Result<CouponDiscount, CouponError> {
    let coupon = match coupon {
        Some(c) if c.is_active => c,
        _ => {
            return Err(CouponError::NotFound {
                code: code.to_string(),
            })
        }
    };

    if let Some(from) = coupon.valid_from {
        if now < from {
            return Err(CouponError::NotYetValid {
                code: coupon.code.clone(),
            });
        }
    }

    if let Some(until) = coupon.valid_until {
        if now > until {
            return Err(CouponError::Expired {
                code: coupon.code.clone(),
            });
        }
    }

    if order_amount < coupon.min_order_amount() {
        return Err(CouponError::BelowMinimum {
            code: coupon.code.clone(),
            minimum_cents: coupon.min_order_amount_cents,
            order_amount_cents: order_amount.cents(),
        });
    }

    if let Some(max_uses) = coupon.max_uses {
        if coupon.current_uses >= max_uses {
            return Err(CouponError::UsageExceeded {
                code: coupon.code.clone(),
                max_uses,
            });
        }
    }

    Ok(CouponDiscount {
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        discount: compute_discount(coupon, order_amount),
    })
}

// =============================================================================
// Coupon Creation
// =============================================================================

/// Admin input for creating a coupon.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage coupons, cents for fixed coupons.
    pub discount_value: i64,
    #[serde(default)]
    pub min_order_amount_cents: i64,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl NewCoupon {
    /// Validates the input and returns it with the code normalized.
    pub fn validated(mut self) -> CoreResult<Self> {
        self.code = normalize_coupon_code(&self.code)?;

        match self.discount_type {
            DiscountType::Percentage => {
                let bps = u32::try_from(self.discount_value).unwrap_or(u32::MAX);
                validate_bps("discountValue", bps)?;
            }
            DiscountType::Fixed => validate_amount_cents("discountValue", self.discount_value)?,
        }
        validate_amount_cents("minOrderAmountCents", self.min_order_amount_cents)?;

        if let Some(max) = self.max_uses {
            if max <= 0 {
                return Err(crate::ValidationError::MustBePositive {
                    field: "maxUses".to_string(),
                }
                .into());
            }
        }

        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until < from {
                return Err(crate::ValidationError::InvalidFormat {
                    field: "validUntil".to_string(),
                    reason: "must not be before validFrom".to_string(),
                }
                .into());
            }
        }

        Ok(self)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn coupon(code: &str, discount_type: DiscountType, value: i64) -> Coupon {
        Coupon {
            id: "c-1".to_string(),
            code: code.to_string(),
            discount_type,
            discount_value: value,
            min_order_amount_cents: 0,
            max_uses: None,
            current_uses: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_save20_example() {
        let c = coupon("SAVE20", DiscountType::Percentage, 2000);
        let result = validate_coupon("SAVE20", Some(&c), Money::from_cents(10_000), now()).unwrap();

        assert_eq!(result.discount.cents(), 2_000);
        assert_eq!((Money::from_cents(10_000) - result.discount).cents(), 8_000);
    }

    #[test]
    fn test_fixed_discount_capped_at_order_amount() {
        let c = coupon("TENOFF", DiscountType::Fixed, 1_000);

        let big = validate_coupon("TENOFF", Some(&c), Money::from_cents(5_000), now()).unwrap();
        assert_eq!(big.discount.cents(), 1_000);

        let small = validate_coupon("TENOFF", Some(&c), Money::from_cents(600), now()).unwrap();
        assert_eq!(small.discount.cents(), 600);
    }

    #[test]
    fn test_discount_never_exceeds_amount() {
        let over = coupon("HUGE", DiscountType::Percentage, 25_000);
        let fixed = coupon("BIG", DiscountType::Fixed, 1_000_000);

        for amount in [1, 99, 100, 4_999, 10_000, 123_457] {
            let amount = Money::from_cents(amount);
            assert!(compute_discount(&over, amount) <= amount);
            assert!(compute_discount(&fixed, amount) <= amount);
        }
    }

    #[test]
    fn test_missing_or_inactive_is_not_found() {
        let err = validate_coupon("NOPE", None, Money::from_cents(100), now()).unwrap_err();
        assert_eq!(err, CouponError::NotFound { code: "NOPE".into() });

        let mut c = coupon("OFF", DiscountType::Fixed, 100);
        c.is_active = false;
        let err = validate_coupon("OFF", Some(&c), Money::from_cents(100), now()).unwrap_err();
        assert!(matches!(err, CouponError::NotFound { .. }));
    }

    #[test]
    fn test_validity_window() {
        let mut c = coupon("WINDOW", DiscountType::Fixed, 100);
        c.valid_from = Some(now() + Duration::days(1));
        let err = validate_coupon("WINDOW", Some(&c), Money::from_cents(1_000), now()).unwrap_err();
        assert!(matches!(err, CouponError::NotYetValid { .. }));

        c.valid_from = Some(now() - Duration::days(10));
        c.valid_until = Some(now() - Duration::seconds(1));
        let err = validate_coupon("WINDOW", Some(&c), Money::from_cents(1_000), now()).unwrap_err();
        assert!(matches!(err, CouponError::Expired { .. }));

        c.valid_until = Some(now());
        assert!(validate_coupon("WINDOW", Some(&c), Money::from_cents(1_000), now()).is_ok());
    }

    #[test]
    fn test_minimum_and_usage() {
        let mut c = coupon("MIN50", DiscountType::Percentage, 1000);
        c.min_order_amount_cents = 5_000;

        let err = validate_coupon("MIN50", Some(&c), Money::from_cents(4_999), now()).unwrap_err();
        assert!(matches!(err, CouponError::BelowMinimum { minimum_cents: 5_000, .. }));
        assert!(validate_coupon("MIN50", Some(&c), Money::from_cents(5_000), now()).is_ok());

        c.max_uses = Some(3);
        c.current_uses = 3;
        let err = validate_coupon("MIN50", Some(&c), Money::from_cents(5_000), now()).unwrap_err();
        assert_eq!(
            err,
            CouponError::UsageExceeded {
                code: "MIN50".into(),
                max_uses: 3
            }
        );
    }

    #[test]
    fn test_new_coupon_validation() {
        let input = NewCoupon {
            code: "spring15".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 1500,
            min_order_amount_cents: 0,
            max_uses: Some(100),
            valid_from: None,
            valid_until: None,
        };
        assert_eq!(input.clone().validated().unwrap().code, "SPRING15");

        let mut bad = input.clone();
        bad.discount_value = 20_000;
        assert!(bad.validated().is_err());

        let mut bad = input;
        bad.max_uses = Some(0);
        assert!(bad.validated().is_err());
    }
}
