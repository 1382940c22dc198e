//! Partner referral commission.

use crate::money::Money;
use crate::types::Partner;

/// Commission owed to `partner` on an order that paid `final_price`.
/// Inactive partners earn nothing.
pub fn commission_for(partner: &Partner, final_price: Money) -> Money {
    if !partner.is_active {
        return Money::zero();
    }
    final_price.clamp_non_negative().percentage(partner.commission_rate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn partner(bps: u32, active: bool) -> Partner {
        Partner {
            id: "p-1".to_string(),
            name: "Scent Blog".to_string(),
            referral_code: "SCENTBLOG".to_string(),
            commission_bps: bps,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_commission() {
        assert_eq!(commission_for(&partner(750, true), Money::from_cents(8_000)).cents(), 600);
        assert!(commission_for(&partner(750, false), Money::from_cents(8_000)).is_zero());
        assert!(commission_for(&partner(750, true), Money::from_cents(-10)).is_zero());
    }
}
