//! # aroma-core: Pure Business Logic for the Aroma Storefront
//!
//! Everything that decides what a customer pays and what they earn lives
//! here, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aroma Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Storefront / Admin (React)                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP + JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    storefront-api (axum)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ aroma-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  coupon  │ │   tier   │ │ cashback │ │     pricing      │  │   │
//! │  │   │ validator│ │ resolver │ │aggregator│ │ (uses the three) │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   loyalty • order • referral • forecast • recently_viewed      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    aroma-db (SQLite)                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Coupon, CustomerTier, Order, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation and normalization
//! - [`coupon`] - Coupon validator
//! - [`tier`] - Customer tier resolver
//! - [`cashback`] - Cashback bonus aggregator and points conversion
//! - [`pricing`] - Price calculator
//! - [`loyalty`] - Loyalty account rules (annual bonuses, redemption)
//! - [`order`] - Order lines and the order status state machine
//! - [`referral`] - Partner commission
//! - [`forecast`] - Inventory demand prediction
//! - [`recently_viewed`] - Bounded recently-viewed product list
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: callers pass `now` / `today`, nothing reads the clock
//! 2. **Integer Money**: all monetary values are cents (i64)
//! 3. **Basis Points**: all percentages are bps (u32), so 6.5% is exactly 650
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use aroma_core::money::Money;
//! use aroma_core::types::Percent;
//!
//! let order = Money::from_cents(10_000);
//! let discount = order.percentage(Percent::from_whole(20));
//! assert_eq!(discount.cents(), 2_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cashback;
pub mod coupon;
pub mod error;
pub mod forecast;
pub mod loyalty;
pub mod money;
pub mod order;
pub mod pricing;
pub mod recently_viewed;
pub mod referral;
pub mod tier;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, CouponError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Loyalty points earned per whole currency unit spent.
pub const POINTS_PER_CURRENCY_UNIT: i64 = 10;

/// Points that convert into one whole currency unit of discount.
pub const POINTS_PER_REDEEMABLE_UNIT: i64 = 100;

/// Minor units (cents) in one major currency unit.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Longest coupon code accepted, after normalization.
pub const MAX_COUPON_CODE_LENGTH: usize = 20;

/// Base cashback applied to products that do not override it (5%).
pub const DEFAULT_BASE_CASHBACK_BPS: u32 = 500;

/// Maximum distinct products in a single order.
pub const MAX_ORDER_LINES: usize = 50;

/// Maximum quantity of a single product in one order.
pub const MAX_ITEM_QUANTITY: i64 = 99;

/// Products remembered per customer in the recently-viewed list.
pub const MAX_RECENTLY_VIEWED: usize = 12;
