//! # Error Types
//!
//! Domain-specific error types for aroma-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  aroma-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── CouponError      - Why a coupon code cannot be applied            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  aroma-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  storefront-api errors                                                 │
//! │  └── ApiError         - HTTP status + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is no longer sold).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough stock to place the order.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// An order was submitted without any lines.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// Order has exceeded maximum allowed lines.
    #[error("Order cannot have more than {max} items")]
    OrderTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Order status change that the lifecycle does not allow.
    ///
    /// ## Allowed Transitions
    /// ```text
    /// pending_payment ─► paid ─► processing ─► shipped ─► delivered
    ///        │            │          │            │
    ///        └────────────┴──────────┴────────────┴──► cancelled
    /// ```
    #[error("Order cannot move from {from} to {to}")]
    InvalidOrderTransition { from: String, to: String },

    /// Point redemption larger than the balance.
    #[error("Insufficient points: available {available}, requested {requested}")]
    InsufficientPoints { available: i64, requested: i64 },

    /// Annual bonus already used this calendar year.
    #[error("{claim} bonus already claimed in {year}")]
    AlreadyClaimed { claim: String, year: i32 },

    /// Annual bonus requested on a day it does not apply.
    #[error("{claim} bonus is not available today")]
    NotEligible { claim: String },

    /// A birthday was already set and cannot be changed.
    #[error("Birthday is already set and cannot be changed")]
    BirthdayLocked,

    /// Coupon cannot be applied.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Coupon Error
// =============================================================================

/// Reasons a coupon code is rejected, in the order they are checked.
///
/// ## Check Order
/// ```text
/// code ──► NotFound ──► NotYetValid ──► Expired ──► BelowMinimum ──► UsageExceeded ──► OK
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// No active coupon with this code.
    #[error("Coupon {code} not found")]
    NotFound { code: String },

    /// The validity window has not opened yet.
    #[error("Coupon {code} is not valid yet")]
    NotYetValid { code: String },

    /// The validity window has closed.
    #[error("Coupon {code} has expired")]
    Expired { code: String },

    /// Order amount is below the coupon's minimum.
    #[error("Coupon {code} requires a minimum order of {minimum_cents} (order is {order_amount_cents})")]
    BelowMinimum {
        code: String,
        minimum_cents: i64,
        order_amount_cents: i64,
    },

    /// The coupon reached its usage cap.
    #[error("Coupon {code} has reached its usage limit of {max_uses}")]
    UsageExceeded { code: String, max_uses: i64 },
}

impl CouponError {
    /// Machine-readable reason, used in API error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            CouponError::NotFound { .. } => "NOT_FOUND",
            CouponError::NotYetValid { .. } => "NOT_YET_VALID",
            CouponError::Expired { .. } => "EXPIRED",
            CouponError::BelowMinimum { .. } => "BELOW_MINIMUM",
            CouponError::UsageExceeded { .. } => "USAGE_EXCEEDED",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
