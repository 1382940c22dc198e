//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A storefront computing 6.5% cashback on 79.90 in floating point:       │
//! │    79.90 * 0.065 = 5.193499999999999  ❌ which cent is it?              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer cents + basis points                             │
//! │    (7990 * 650 + 5000) / 10000 = 519 cents                              │
//! │    Every rounding decision is explicit and reproducible                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use aroma_core::money::Money;
//! use aroma_core::types::Percent;
//!
//! let price = Money::from_cents(7990); // 79.90
//! let cashback = price.percentage(Percent::from_bps(650));
//! assert_eq!(cashback.cents(), 519);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Percent;
use crate::MINOR_UNITS_PER_MAJOR;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate values (e.g. `price - discount`) may go
///   negative before clamping with [`Money::clamp_non_negative`]
/// - **Single field tuple struct**: serializes as a bare JSON number
///
/// ## Where Money Flows
/// ```text
/// Product.price_cents ──► OrderLine.line_total ──► subtotal
///                                                     │
///          coupon discount + tier discount ◄──────────┤
///                                                     ▼
///                                         final price ──► cashback, points
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use aroma_core::money::Money;
    ///
    /// let price = Money::from_cents(8950); // 89.50
    /// assert_eq!(price.cents(), 8950);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use aroma_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(250, 0).cents(), 25_000);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * MINOR_UNITS_PER_MAJOR - minor)
        } else {
            Money(major * MINOR_UNITS_PER_MAJOR + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated towards zero).
    ///
    /// ```rust
    /// use aroma_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).major(), 10);
    /// assert_eq!(Money::from_cents(-550).major(), -5);
    /// ```
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_UNITS_PER_MAJOR
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % MINOR_UNITS_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// Final prices pass through this, so no order ever totals below zero.
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Rounds down to whole major units.
    ///
    /// ```rust
    /// use aroma_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).floor_to_major().cents(), 1000);
    /// ```
    #[inline]
    pub const fn floor_to_major(&self) -> Self {
        Money(self.major() * MINOR_UNITS_PER_MAJOR)
    }

    /// Computes `percent` of this amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math on basis points: `(amount * bps + 5000) / 10000`.
    /// i128 keeps large order totals from overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use aroma_core::money::Money;
    /// use aroma_core::types::Percent;
    ///
    /// let subtotal = Money::from_cents(10_000);
    /// assert_eq!(subtotal.percentage(Percent::from_bps(1300)).cents(), 1_300);
    /// ```
    pub fn percentage(&self, percent: Percent) -> Money {
        let cents = (self.0 as i128 * percent.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount as `major.minor`; currency formatting belongs to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
