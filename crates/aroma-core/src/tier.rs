//! # Customer Tier Resolver
//!
//! Maps lifetime spend to a loyalty tier.
//!
//! ## Resolution
//! ```text
//! total_spent = 250.00
//!
//!   priority ▼   tier        threshold   bonus
//!   ─────────────────────────────────────────────
//!        4       Platinum      500.00     15%     ✗  250 < 500
//!        3       Gold          200.00     10%     ✓  ◄── first match wins
//!        2       Silver         50.00      5%
//!        1       Bronze          0.00      0%
//! ```
//!
//! Inactive tiers are skipped. When nothing matches (or nothing is
//! configured) the hard-coded Bronze / 0% fallback is returned, so the
//! resolver always yields exactly one tier.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CustomerTier, Percent};
use crate::validation::{validate_amount_cents, validate_bps, validate_name, ValidationResult};

/// Name of the fallback tier.
pub const FALLBACK_TIER_NAME: &str = "Bronze";

/// The tier a customer currently belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTier {
    pub tier_name: String,
    pub bonus: Percent,
    pub min_lifetime_purchases: Money,
    /// True when no configured tier matched.
    pub is_fallback: bool,
}

impl ResolvedTier {
    /// Bronze, 0 threshold, 0%.
    pub fn fallback() -> Self {
        ResolvedTier {
            tier_name: FALLBACK_TIER_NAME.to_string(),
            bonus: Percent::zero(),
            min_lifetime_purchases: Money::zero(),
            is_fallback: true,
        }
    }
}

impl From<&CustomerTier> for ResolvedTier {
    fn from(tier: &CustomerTier) -> Self {
        ResolvedTier {
            tier_name: tier.tier_name.clone(),
            bonus: tier.bonus(),
            min_lifetime_purchases: tier.threshold(),
            is_fallback: false,
        }
    }
}

/// Progress towards the next tier up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NextTier {
    pub tier_name: String,
    pub bonus: Percent,
    /// Spend still needed to reach it.
    pub remaining: Money,
}

/// Active tiers, highest priority first. Ties break on the higher threshold.
fn ranked(tiers: &[CustomerTier]) -> Vec<&CustomerTier> {
    let mut active: Vec<&CustomerTier> = tiers.iter().filter(|t| t.is_active).collect();
    active.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.min_lifetime_purchases_cents.cmp(&a.min_lifetime_purchases_cents))
    });
    active
}

/// Returns the highest-priority active tier whose threshold is met.
pub fn resolve_tier(tiers: &[CustomerTier], total_spent: Money) -> ResolvedTier {
    ranked(tiers)
        .into_iter()
        .find(|t| t.threshold() <= total_spent)
        .map(ResolvedTier::from)
        .unwrap_or_else(ResolvedTier::fallback)
}

/// Returns the cheapest active tier with a larger bonus that the customer
/// has not reached yet, if any.
pub fn next_tier(tiers: &[CustomerTier], total_spent: Money) -> Option<NextTier> {
    let current = resolve_tier(tiers, total_spent);

    tiers
        .iter()
        .filter(|t| t.is_active && t.threshold() > total_spent && t.bonus() > current.bonus)
        .min_by_key(|t| t.min_lifetime_purchases_cents)
        .map(|t| NextTier {
            tier_name: t.tier_name.clone(),
            bonus: t.bonus(),
            remaining: t.threshold() - total_spent,
        })
}

/// Admin input for creating or updating a tier (keyed by name).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TierInput {
    pub tier_name: String,
    pub cashback_bonus_bps: u32,
    pub min_lifetime_purchases_cents: i64,
    pub priority: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TierInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("tierName", &self.tier_name)?;
        validate_bps("cashbackBonusBps", self.cashback_bonus_bps)?;
        validate_amount_cents("minLifetimePurchasesCents", self.min_lifetime_purchases_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(name: &str, threshold_major: i64, bonus_pct: u32, priority: i64) -> CustomerTier {
        CustomerTier {
            id: name.to_lowercase(),
            tier_name: name.to_string(),
            cashback_bonus_bps: bonus_pct * 100,
            min_lifetime_purchases_cents: threshold_major * 100,
            priority,
            is_active: true,
        }
    }

    fn standard_tiers() -> Vec<CustomerTier> {
        vec![
            tier("Bronze", 0, 0, 1),
            tier("Silver", 50, 5, 2),
            tier("Gold", 200, 10, 3),
            tier("Platinum", 500, 15, 4),
        ]
    }

    #[test]
    fn test_resolves_gold_for_250() {
        let resolved = resolve_tier(&standard_tiers(), Money::from_major_minor(250, 0));
        assert_eq!(resolved.tier_name, "Gold");
        assert_eq!(resolved.bonus, Percent::from_whole(10));
        assert!(!resolved.is_fallback);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let tiers = standard_tiers();
        assert_eq!(resolve_tier(&tiers, Money::from_cents(50_000)).tier_name, "Platinum");
        assert_eq!(resolve_tier(&tiers, Money::from_cents(49_999)).tier_name, "Gold");
        assert_eq!(resolve_tier(&tiers, Money::zero()).tier_name, "Bronze");
    }

    #[test]
    fn test_order_of_input_does_not_matter() {
        let mut tiers = standard_tiers();
        tiers.reverse();
        assert_eq!(
            resolve_tier(&tiers, Money::from_major_minor(60, 0)).tier_name,
            "Silver"
        );
    }

    #[test]
    fn test_priority_beats_threshold() {
        // A promotional tier with a low threshold but top priority wins.
        let mut tiers = standard_tiers();
        tiers.push(tier("Launch", 10, 7, 9));
        assert_eq!(
            resolve_tier(&tiers, Money::from_major_minor(600, 0)).tier_name,
            "Launch"
        );
    }

    #[test]
    fn test_fallback_when_nothing_configured_or_matches() {
        assert_eq!(resolve_tier(&[], Money::from_cents(1_000_000)), ResolvedTier::fallback());

        let only_gold = vec![tier("Gold", 200, 10, 3)];
        assert!(resolve_tier(&only_gold, Money::from_major_minor(10, 0)).is_fallback);
    }

    #[test]
    fn test_inactive_tiers_are_skipped() {
        let mut tiers = standard_tiers();
        tiers[2].is_active = false; // Gold
        assert_eq!(
            resolve_tier(&tiers, Money::from_major_minor(250, 0)).tier_name,
            "Silver"
        );
    }

    #[test]
    fn test_next_tier_progress() {
        let tiers = standard_tiers();
        let next = next_tier(&tiers, Money::from_major_minor(250, 0)).unwrap();
        assert_eq!(next.tier_name, "Platinum");
        assert_eq!(next.remaining, Money::from_major_minor(250, 0));

        assert!(next_tier(&tiers, Money::from_major_minor(900, 0)).is_none());
    }

    #[test]
    fn test_tier_input_validation() {
        let input = TierInput {
            tier_name: "Diamond".to_string(),
            cashback_bonus_bps: 2_000,
            min_lifetime_purchases_cents: 100_000,
            priority: 5,
            is_active: true,
        };
        assert!(input.validate().is_ok());

        let bad = TierInput {
            cashback_bonus_bps: 10_001,
            ..input.clone()
        };
        assert!(bad.validate().is_err());

        let unnamed = TierInput {
            tier_name: "  ".to_string(),
            ..input
        };
        assert!(unnamed.validate().is_err());
    }
}
