//! # Domain Types
//!
//! Core domain types used throughout Aroma.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog            Discounts            Loyalty           Orders       │
//! │  ─────────          ─────────            ───────           ──────       │
//! │  Product            Coupon               CustomerTier      Order        │
//! │                     DiscountType         CashbackBonus     OrderItem    │
//! │                                          BonusType         OrderStatus  │
//! │                                          LoyaltyAccount                 │
//! │                                          LedgerEntry       Partner      │
//! │                                                                         │
//! │  Shared value type: Percent (basis points, 650 = 6.5%)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary fields are stored as `*_cents: i64` and percentage fields as
//! `*_bps: u32`, matching the database columns one to one. Accessors return
//! [`Money`] / [`Percent`] for arithmetic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Percent
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%. The loyalty program uses fractional rates
/// (a 6.5% tier bonus, a 1.5% newsletter bonus), which are exact in bps.
/// Being unsigned, a `Percent` can never be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// 100%.
    pub const FULL: Percent = Percent(10_000);

    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a percentage from whole percent (20 -> 20%).
    #[inline]
    pub const fn from_whole(pct: u32) -> Self {
        Percent(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl Add for Percent {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Percent(self.0.saturating_add(other.0))
    }
}

impl Sum for Percent {
    fn sum<I: Iterator<Item = Percent>>(iter: I) -> Self {
        iter.fold(Percent::zero(), |acc, p| acc + p)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A perfume in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name ("Oud Noir Eau de Parfum").
    pub name: String,

    /// Fragrance house.
    pub brand: String,

    pub description: Option<String>,

    /// Bottle size in millilitres.
    pub volume_ml: Option<i64>,

    /// List price in cents.
    pub price_cents: i64,

    /// Promotional price in cents, when on sale.
    pub sale_price_cents: Option<i64>,

    /// Base cashback earned on this product, in basis points.
    pub cashback_bps: u32,

    /// Units on hand.
    pub stock: i64,

    /// Whether product is listed (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price the customer pays before discounts: sale price when set,
    /// list price otherwise.
    pub fn effective_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents.unwrap_or(self.price_cents))
    }

    /// Returns the base cashback rate.
    #[inline]
    pub fn base_cashback(&self) -> Percent {
        Percent::from_bps(self.cashback_bps)
    }

    /// Checks whether `quantity` units can be sold.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock >= quantity
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// How a coupon's `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is in basis points of the order amount.
    Percentage,
    /// `discount_value` is a fixed amount in cents.
    Fixed,
}

/// A code-based discount with validity constraints and usage limits.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,

    /// Normalized (uppercase) code.
    pub code: String,

    pub discount_type: DiscountType,

    /// Basis points for percentage coupons, cents for fixed coupons.
    pub discount_value: i64,

    pub min_order_amount_cents: i64,

    /// Usage cap; `None` means unlimited.
    pub max_uses: Option<i64>,

    pub current_uses: i64,

    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Returns the minimum order amount as Money.
    #[inline]
    pub fn min_order_amount(&self) -> Money {
        Money::from_cents(self.min_order_amount_cents)
    }

    /// Whether the usage cap has been reached.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.max_uses, Some(max) if self.current_uses >= max)
    }
}

// =============================================================================
// Loyalty Program Configuration
// =============================================================================

/// A customer segment granting a bonus percentage based on lifetime spend.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerTier {
    pub id: String,

    /// "Bronze", "Silver", "Gold", "Platinum".
    pub tier_name: String,

    /// Extra cashback (or discount, depending on policy) in basis points.
    pub cashback_bonus_bps: u32,

    /// Lifetime spend needed to reach this tier, in cents.
    pub min_lifetime_purchases_cents: i64,

    /// Higher priority tiers are considered first.
    pub priority: i64,

    pub is_active: bool,
}

impl CustomerTier {
    #[inline]
    pub fn bonus(&self) -> Percent {
        Percent::from_bps(self.cashback_bonus_bps)
    }

    #[inline]
    pub fn threshold(&self) -> Money {
        Money::from_cents(self.min_lifetime_purchases_cents)
    }
}

/// Situations that unlock an additional cashback percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    /// Customer is subscribed to the newsletter.
    Newsletter,
    /// Order placed on the customer's birthday (once per year).
    Birthday,
    /// Order placed on the membership anniversary (once per year).
    Anniversary,
    /// Order attributed to a partner referral code.
    Referral,
}

impl BonusType {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusType::Newsletter => "newsletter",
            BonusType::Birthday => "birthday",
            BonusType::Anniversary => "anniversary",
            BonusType::Referral => "referral",
        }
    }

    /// Bonuses limited to one use per calendar year.
    pub fn is_annual(&self) -> bool {
        matches!(self, BonusType::Birthday | BonusType::Anniversary)
    }
}

impl fmt::Display for BonusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An admin-configured additive cashback modifier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashbackBonus {
    pub id: String,
    pub bonus_name: String,
    pub bonus_type: BonusType,
    pub bonus_bps: u32,
    pub is_active: bool,
}

impl CashbackBonus {
    #[inline]
    pub fn percent(&self) -> Percent {
        Percent::from_bps(self.bonus_bps)
    }
}

// =============================================================================
// Loyalty Account
// =============================================================================

/// Per-customer loyalty state.
///
/// The tier is never stored: it is derived from `total_spent_cents` by the
/// tier resolver each time it is needed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccount {
    pub customer_id: String,

    /// Redeemable points (100 points = 1 currency unit).
    pub points_balance: i64,

    /// Accumulated cashback credit in cents.
    pub cashback_balance_cents: i64,

    /// Lifetime spend on delivered orders, in cents.
    pub total_spent_cents: i64,

    /// Apply available points automatically at checkout.
    pub auto_redeem_points: bool,

    pub newsletter_subscribed: bool,

    #[ts(as = "Option<String>")]
    pub birthday: Option<NaiveDate>,

    #[ts(as = "String")]
    pub member_since: NaiveDate,

    pub last_birthday_claim_year: Option<i32>,

    pub last_anniversary_claim_year: Option<i32>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Kind of movement recorded in the loyalty ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    /// Points and cashback credited for a delivered order.
    Earn,
    /// Points debited when an order using them is paid.
    Redeem,
    /// Points returned when a paid order is cancelled.
    Refund,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Earn => "earn",
            LedgerEntryType::Redeem => "redeem",
            LedgerEntryType::Refund => "refund",
        }
    }
}

/// One movement of points or cashback.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub customer_id: String,
    pub order_id: Option<String>,
    pub entry_type: LedgerEntryType,
    pub points_delta: i64,
    pub cashback_delta_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Orders
// =============================================================================

/// Lifecycle status of an order.
///
/// See [`crate::order`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::PendingPayment
    }
}

/// A placed order with its frozen price quote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub coupon_code: Option<String>,
    pub coupon_discount_cents: i64,
    pub tier_discount_cents: i64,
    pub points_redeemed: i64,
    pub points_discount_cents: i64,
    /// What the customer pays.
    pub total_cents: i64,
    /// Total cashback rate applied to `total_cents`.
    pub cashback_bps: u32,
    /// Cashback credited on delivery.
    pub cashback_cents: i64,
    /// Purchase points credited on delivery.
    pub points_earned: i64,
    /// Tier the customer was in when the order was placed.
    pub tier_name: String,
    pub referral_code: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in an order.
/// Uses snapshot pattern to freeze product data at time of purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// SKU at time of purchase (frozen).
    pub sku_snapshot: String,
    /// Product name at time of purchase (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of purchase (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    /// Base cashback rate of the product at time of purchase.
    pub cashback_bps: u32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Partners & Newsletter
// =============================================================================

/// An affiliate earning commission on orders placed with their code.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub referral_code: String,
    pub commission_bps: u32,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Partner {
    #[inline]
    pub fn commission_rate(&self) -> Percent {
        Percent::from_bps(self.commission_bps)
    }
}

/// A newsletter signup.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSubscriber {
    pub id: String,
    /// Normalized (lowercase) address.
    pub email: String,
    pub customer_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_construction() {
        assert_eq!(Percent::from_whole(20).bps(), 2000);
        assert_eq!(Percent::from_bps(650).to_string(), "6.50%");
        assert_eq!(Percent::from_whole(13).to_string(), "13%");
        assert!((Percent::from_bps(150).percentage() - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_percent_sum() {
        let total: Percent = [500, 650, 150]
            .into_iter()
            .map(Percent::from_bps)
            .sum();
        assert_eq!(total, Percent::from_whole(13));
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::PendingPayment);
    }

    #[test]
    fn test_bonus_type_annual() {
        assert!(BonusType::Birthday.is_annual());
        assert!(BonusType::Anniversary.is_annual());
        assert!(!BonusType::Newsletter.is_annual());
        assert_eq!(BonusType::Referral.to_string(), "referral");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending_payment\"");
    }
}
