//! # Loyalty Account Rules
//!
//! Date-based bonus eligibility, annual claims and point redemption for a
//! [`LoyaltyAccount`]. Persistence of the results is done by `aroma-db`,
//! which repeats the claim check as a conditional update.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cashback::{points_for_spend, points_value};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{BonusType, LoyaltyAccount};
use crate::POINTS_PER_REDEEMABLE_UNIT;

/// A bonus limited to once per calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AnnualClaim {
    Birthday,
    Anniversary,
}

impl AnnualClaim {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnualClaim::Birthday => "birthday",
            AnnualClaim::Anniversary => "anniversary",
        }
    }

    pub fn bonus_type(&self) -> BonusType {
        match self {
            AnnualClaim::Birthday => BonusType::Birthday,
            AnnualClaim::Anniversary => BonusType::Anniversary,
        }
    }

    pub fn from_bonus_type(bonus_type: BonusType) -> Option<Self> {
        match bonus_type {
            BonusType::Birthday => Some(AnnualClaim::Birthday),
            BonusType::Anniversary => Some(AnnualClaim::Anniversary),
            _ => None,
        }
    }
}

/// Whether `date`'s month/day falls on `today`, treating 29 Feb as 28 Feb
/// in non-leap years.
fn same_day_of_year(date: NaiveDate, today: NaiveDate) -> bool {
    if date.month() == today.month() && date.day() == today.day() {
        return true;
    }

    let leap_day = date.month() == 2 && date.day() == 29;
    let leap_year = NaiveDate::from_ymd_opt(today.year(), 2, 29).is_some();
    leap_day && !leap_year && today.month() == 2 && today.day() == 28
}

impl LoyaltyAccount {
    /// Points balance as money off, in whole currency units.
    pub fn redeemable_discount(&self) -> Money {
        points_value(self.points_balance)
    }

    /// Lifetime spend as money.
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }

    pub fn cashback_balance(&self) -> Money {
        Money::from_cents(self.cashback_balance_cents)
    }

    pub fn is_birthday(&self, today: NaiveDate) -> bool {
        self.birthday
            .map(|b| same_day_of_year(b, today))
            .unwrap_or(false)
    }

    /// Membership anniversary; the sign-up year itself does not count.
    pub fn is_anniversary(&self, today: NaiveDate) -> bool {
        today.year() > self.member_since.year() && same_day_of_year(self.member_since, today)
    }

    fn last_claim_year(&self, claim: AnnualClaim) -> Option<i32> {
        match claim {
            AnnualClaim::Birthday => self.last_birthday_claim_year,
            AnnualClaim::Anniversary => self.last_anniversary_claim_year,
        }
    }

    /// Checks that `claim` applies today and has not been used this year.
    pub fn check_claim(&self, claim: AnnualClaim, today: NaiveDate) -> CoreResult<()> {
        let on_day = match claim {
            AnnualClaim::Birthday => self.is_birthday(today),
            AnnualClaim::Anniversary => self.is_anniversary(today),
        };
        if !on_day {
            return Err(CoreError::NotEligible {
                claim: claim.as_str().to_string(),
            });
        }

        if self.last_claim_year(claim) == Some(today.year()) {
            return Err(CoreError::AlreadyClaimed {
                claim: claim.as_str().to_string(),
                year: today.year(),
            });
        }

        Ok(())
    }

    pub fn can_claim(&self, claim: AnnualClaim, today: NaiveDate) -> bool {
        self.check_claim(claim, today).is_ok()
    }

    /// Marks `claim` as used for `today`'s year.
    pub fn claim(&mut self, claim: AnnualClaim, today: NaiveDate) -> CoreResult<()> {
        self.check_claim(claim, today)?;
        match claim {
            AnnualClaim::Birthday => self.last_birthday_claim_year = Some(today.year()),
            AnnualClaim::Anniversary => self.last_anniversary_claim_year = Some(today.year()),
        }
        Ok(())
    }

    /// Situational bonus types that apply to an order placed `today`.
    pub fn applicable_bonuses(&self, today: NaiveDate, has_referral: bool) -> Vec<BonusType> {
        let mut applicable = Vec::new();

        if self.newsletter_subscribed {
            applicable.push(BonusType::Newsletter);
        }
        if self.can_claim(AnnualClaim::Birthday, today) {
            applicable.push(BonusType::Birthday);
        }
        if self.can_claim(AnnualClaim::Anniversary, today) {
            applicable.push(BonusType::Anniversary);
        }
        if has_referral {
            applicable.push(BonusType::Referral);
        }

        applicable
    }

    /// Debits `points` from the balance. Only whole redeemable units are
    /// accepted.
    pub fn redeem_points(&mut self, points: i64) -> CoreResult<Money> {
        if points <= 0 || points % POINTS_PER_REDEEMABLE_UNIT != 0 {
            return Err(crate::ValidationError::InvalidFormat {
                field: "pointsToRedeem".to_string(),
                reason: format!("must be a positive multiple of {}", POINTS_PER_REDEEMABLE_UNIT),
            }
            .into());
        }
        if points > self.points_balance {
            return Err(CoreError::InsufficientPoints {
                available: self.points_balance,
                requested: points,
            });
        }

        self.points_balance -= points;
        Ok(points_value(points))
    }

    /// Checks a birthday update. The birthday can be set once; sending the
    /// same date again is accepted.
    pub fn check_birthday_change(&self, birthday: NaiveDate) -> CoreResult<()> {
        match self.birthday {
            Some(current) if current != birthday => Err(CoreError::BirthdayLocked),
            _ => Ok(()),
        }
    }

    /// Credits a completed purchase: spend, purchase points and cashback.
    /// Returns the points credited.
    pub fn record_purchase(&mut self, spend: Money, cashback: Money) -> i64 {
        let points = points_for_spend(spend);
        self.points_balance += points;
        self.cashback_balance_cents += cashback.clamp_non_negative().cents();
        self.total_spent_cents += spend.clamp_non_negative().cents();
        points
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account() -> LoyaltyAccount {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        LoyaltyAccount {
            customer_id: "cust-1".to_string(),
            points_balance: 1_250,
            cashback_balance_cents: 0,
            total_spent_cents: 0,
            auto_redeem_points: false,
            newsletter_subscribed: true,
            birthday: Some(date(1990, 7, 14)),
            member_since: date(2024, 3, 10),
            last_birthday_claim_year: None,
            last_anniversary_claim_year: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_birthday_claim_once_per_year() {
        let mut acct = account();
        let today = date(2026, 7, 14);

        assert!(acct.applicable_bonuses(today, false).contains(&BonusType::Birthday));
        acct.claim(AnnualClaim::Birthday, today).unwrap();

        let err = acct.claim(AnnualClaim::Birthday, today).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyClaimed { year: 2026, .. }));
        assert!(!acct.applicable_bonuses(today, false).contains(&BonusType::Birthday));

        // Next year it is available again.
        assert!(acct.can_claim(AnnualClaim::Birthday, date(2027, 7, 14)));
    }

    #[test]
    fn test_birthday_only_on_the_day() {
        let acct = account();
        let err = acct.check_claim(AnnualClaim::Birthday, date(2026, 7, 15)).unwrap_err();
        assert!(matches!(err, CoreError::NotEligible { .. }));

        let mut no_birthday = account();
        no_birthday.birthday = None;
        assert!(!no_birthday.is_birthday(date(2026, 7, 14)));
    }

    #[test]
    fn test_leap_day_birthday() {
        let mut acct = account();
        acct.birthday = Some(date(2000, 2, 29));

        assert!(acct.is_birthday(date(2027, 2, 28)));
        assert!(!acct.is_birthday(date(2028, 2, 28)));
        assert!(acct.is_birthday(date(2028, 2, 29)));
    }

    #[test]
    fn test_anniversary_skips_signup_year() {
        let acct = account();
        assert!(!acct.is_anniversary(date(2024, 3, 10)));
        assert!(acct.is_anniversary(date(2025, 3, 10)));
        assert_eq!(
            acct.applicable_bonuses(date(2025, 3, 10), true),
            vec![BonusType::Newsletter, BonusType::Anniversary, BonusType::Referral]
        );
    }

    #[test]
    fn test_redeem_points() {
        let mut acct = account();
        assert_eq!(acct.redeemable_discount().cents(), 1_200);

        assert_eq!(acct.redeem_points(1_000).unwrap().cents(), 1_000);
        assert_eq!(acct.points_balance, 250);

        assert!(acct.redeem_points(150).is_err());
        let err = acct.redeem_points(300).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientPoints { available: 250, .. }));
    }

    #[test]
    fn test_record_purchase() {
        let mut acct = account();
        let points = acct.record_purchase(Money::from_cents(8_950), Money::from_cents(1_164));

        assert_eq!(points, 890);
        assert_eq!(acct.points_balance, 2_140);
        assert_eq!(acct.cashback_balance().cents(), 1_164);
        assert_eq!(acct.total_spent().cents(), 8_950);
    }

    #[test]
    fn test_birthday_is_write_once() {
        let mut acct = account();
        acct.birthday = None;
        assert!(acct.check_birthday_change(date(1990, 7, 14)).is_ok());

        acct.birthday = Some(date(1990, 7, 14));
        assert!(acct.check_birthday_change(date(1990, 7, 14)).is_ok());
        assert!(matches!(
            acct.check_birthday_change(date(1990, 8, 1)),
            Err(CoreError::BirthdayLocked)
        ));
    }
}
