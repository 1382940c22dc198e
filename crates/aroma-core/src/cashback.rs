//! # Cashback Bonus Aggregator
//!
//! Sums the cashback percentages that apply to an order and converts
//! between spend, points and redeemable discount.
//!
//! ## Stacking
//! ```text
//!   base (product)        5.00%
//! + tier (Gold-ish)       6.50%
//! + newsletter            1.50%
//! + birthday              ─       (only on the day, once a year)
//! ─────────────────────────────
//!   total                13.00%   (optionally capped)
//! ```
//!
//! ## Points
//! ```text
//! spend 89.50  ──floor──►  89 units  ──×10──►  890 points
//! 890 points   ──/100──►   8 units   ──►       8.00 redeemable
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{BonusType, CashbackBonus, Percent};
use crate::validation::{validate_bps, validate_name, ValidationResult};
use crate::{MINOR_UNITS_PER_MAJOR, POINTS_PER_CURRENCY_UNIT, POINTS_PER_REDEEMABLE_UNIT};

/// One situational bonus that contributed to the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppliedBonus {
    pub bonus_type: BonusType,
    pub bonus_name: String,
    pub percent: Percent,
}

/// Every component of the cashback rate, for display and auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashbackBreakdown {
    pub base: Percent,
    pub tier: Percent,
    pub bonuses: Vec<AppliedBonus>,
    /// Rate actually applied.
    pub total: Percent,
    /// True when a cap reduced the uncapped sum.
    pub capped: bool,
}

impl CashbackBreakdown {
    /// Sum of all components before any cap.
    pub fn uncapped_total(&self) -> Percent {
        self.base + self.tier + self.bonuses.iter().map(|b| b.percent).sum::<Percent>()
    }

    /// Cashback earned on `amount` at the applied rate.
    pub fn cashback_on(&self, amount: Money) -> Money {
        amount.clamp_non_negative().percentage(self.total)
    }
}

/// Aggregates base, tier and situational bonuses into one rate.
///
/// Only active bonuses whose type is in `applicable` count. When several
/// active bonuses share a type they all stack, mirroring how the admin
/// configures them. `cap` bounds the total; `None` leaves it uncapped.
pub fn aggregate_cashback(
    base: Percent,
    tier_bonus: Percent,
    bonuses: &[CashbackBonus],
    applicable: &[BonusType],
    cap: Option<Percent>,
) -> CashbackBreakdown {
    let applied: Vec<AppliedBonus> = bonuses
        .iter()
        .filter(|b| b.is_active && applicable.contains(&b.bonus_type))
        .map(|b| AppliedBonus {
            bonus_type: b.bonus_type,
            bonus_name: b.bonus_name.clone(),
            percent: b.percent(),
        })
        .collect();

    let uncapped = base + tier_bonus + applied.iter().map(|b| b.percent).sum::<Percent>();
    let (total, capped) = match cap {
        Some(cap) if uncapped > cap => (cap, true),
        _ => (uncapped, false),
    };

    CashbackBreakdown {
        base,
        tier: tier_bonus,
        bonuses: applied,
        total,
        capped,
    }
}

/// Base rate of a multi-line order: the line rates weighted by line total.
///
/// Each item is `(line_total, line_rate)`. Rounds half up to the nearest
/// basis point. An empty or zero-value order has a zero base rate.
pub fn weighted_base_cashback(lines: &[(Money, Percent)]) -> Percent {
    let total: i128 = lines
        .iter()
        .map(|(amount, _)| amount.clamp_non_negative().cents() as i128)
        .sum();
    if total == 0 {
        return Percent::zero();
    }

    let weighted: i128 = lines
        .iter()
        .map(|(amount, rate)| amount.clamp_non_negative().cents() as i128 * rate.bps() as i128)
        .sum();

    let bps = (weighted + total / 2) / total;
    Percent::from_bps(u32::try_from(bps).unwrap_or(u32::MAX))
}

/// Purchase points for a spend: 10 points per whole currency unit.
pub fn points_for_spend(spend: Money) -> i64 {
    spend.clamp_non_negative().major() * POINTS_PER_CURRENCY_UNIT
}

/// Discount value of a point balance, in whole currency units only.
///
/// ```rust
/// use aroma_core::cashback::points_value;
///
/// assert_eq!(points_value(890).cents(), 800);
/// assert_eq!(points_value(99).cents(), 0);
/// ```
pub fn points_value(points: i64) -> Money {
    let units = points.max(0) / POINTS_PER_REDEEMABLE_UNIT;
    Money::from_cents(units * MINOR_UNITS_PER_MAJOR)
}

/// Points needed to take `amount` off, rounded down to whole units.
pub fn points_for_discount(amount: Money) -> i64 {
    amount.clamp_non_negative().major() * POINTS_PER_REDEEMABLE_UNIT
}

/// Admin input for creating or updating a bonus (keyed by name).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BonusInput {
    pub bonus_name: String,
    pub bonus_type: BonusType,
    pub bonus_bps: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl BonusInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("bonusName", &self.bonus_name)?;
        validate_bps("bonusBps", self.bonus_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bonus(bonus_type: BonusType, bps: u32) -> CashbackBonus {
        CashbackBonus {
            id: bonus_type.as_str().to_string(),
            bonus_name: format!("{} bonus", bonus_type),
            bonus_type,
            bonus_bps: bps,
            is_active: true,
        }
    }

    fn program() -> Vec<CashbackBonus> {
        vec![
            bonus(BonusType::Newsletter, 150),
            bonus(BonusType::Birthday, 500),
            bonus(BonusType::Anniversary, 300),
            bonus(BonusType::Referral, 200),
        ]
    }

    #[test]
    fn test_five_plus_six_and_a_half_plus_newsletter_is_thirteen() {
        let breakdown = aggregate_cashback(
            Percent::from_bps(500),
            Percent::from_bps(650),
            &program(),
            &[BonusType::Newsletter],
            None,
        );

        assert_eq!(breakdown.total, Percent::from_whole(13));
        assert_eq!(breakdown.bonuses.len(), 1);
        assert!(!breakdown.capped);
        assert_eq!(
            breakdown.cashback_on(Money::from_cents(10_000)).cents(),
            1_300
        );
    }

    #[test]
    fn test_only_applicable_active_bonuses_count() {
        let mut bonuses = program();
        bonuses[0].is_active = false;

        let breakdown = aggregate_cashback(
            Percent::from_bps(500),
            Percent::zero(),
            &bonuses,
            &[BonusType::Newsletter, BonusType::Birthday],
            None,
        );

        assert_eq!(breakdown.total, Percent::from_bps(1_000));
        assert_eq!(breakdown.bonuses[0].bonus_type, BonusType::Birthday);
    }

    #[test]
    fn test_cap_limits_total() {
        let all = [
            BonusType::Newsletter,
            BonusType::Birthday,
            BonusType::Anniversary,
            BonusType::Referral,
        ];
        let breakdown = aggregate_cashback(
            Percent::from_bps(500),
            Percent::from_whole(15),
            &program(),
            &all,
            Some(Percent::from_whole(20)),
        );

        assert_eq!(breakdown.uncapped_total(), Percent::from_bps(3_150));
        assert_eq!(breakdown.total, Percent::from_whole(20));
        assert!(breakdown.capped);
    }

    #[test]
    fn test_weighted_base_cashback() {
        let lines = [
            (Money::from_cents(10_000), Percent::from_bps(500)),
            (Money::from_cents(5_000), Percent::from_bps(800)),
        ];
        // (10000*500 + 5000*800) / 15000 = 600
        assert_eq!(weighted_base_cashback(&lines), Percent::from_bps(600));
        assert_eq!(weighted_base_cashback(&[]), Percent::zero());
    }

    #[test]
    fn test_points_conversion() {
        assert_eq!(points_for_spend(Money::from_cents(8_950)), 890);
        assert_eq!(points_for_spend(Money::from_cents(-100)), 0);
        assert_eq!(points_value(250).cents(), 200);
        assert_eq!(points_for_discount(Money::from_cents(850)), 800);
    }
}
