//! # Validation Module
//!
//! Input validation and normalization for Aroma.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront (TypeScript)                                      │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler (Rust)                                          │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: format rules + normalization                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints (coupon code, email, referral code)            │
//! │  └── CHECK constraints (non-negative amounts)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Normalizing validators return the cleaned value, so callers never store
//! or look up an un-normalized code or address.

use crate::error::ValidationError;
use crate::{MAX_COUPON_CODE_LENGTH, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_EMAIL_LENGTH: usize = 254;
const MIN_REFERRAL_CODE_LENGTH: usize = 4;
const MAX_REFERRAL_CODE_LENGTH: usize = 32;

// =============================================================================
// Code Validators
// =============================================================================

/// Validates and normalizes a coupon code.
///
/// ## Rules
/// - Trimmed and uppercased (codes are case-insensitive)
/// - Must not be empty
/// - At most 20 characters
/// - ASCII letters and digits only
///
/// ## Example
/// ```rust
/// use aroma_core::validation::normalize_coupon_code;
///
/// assert_eq!(normalize_coupon_code(" save20 ").unwrap(), "SAVE20");
/// assert!(normalize_coupon_code("SAVE-20").is_err());
/// ```
pub fn normalize_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_ascii_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > MAX_COUPON_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_COUPON_CODE_LENGTH,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters and numbers".to_string(),
        });
    }

    Ok(code)
}

/// Validates and normalizes a partner referral code.
///
/// ## Rules
/// - Trimmed and uppercased
/// - 4 to 32 characters
/// - ASCII letters, digits and hyphens
pub fn normalize_referral_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_ascii_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "referral_code".to_string(),
        });
    }

    if code.len() < MIN_REFERRAL_CODE_LENGTH {
        return Err(ValidationError::TooShort {
            field: "referral_code".to_string(),
            min: MIN_REFERRAL_CODE_LENGTH,
        });
    }

    if code.len() > MAX_REFERRAL_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "referral_code".to_string(),
            max: MAX_REFERRAL_CODE_LENGTH,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "referral_code".to_string(),
            reason: "must contain only letters, numbers and hyphens".to_string(),
        });
    }

    Ok(code)
}

/// Validates a SKU.
///
/// ## Rules
/// - 1 to 50 characters
/// - Alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates and normalizes an email address for the newsletter.
///
/// ## Rules
/// - Trimmed and lowercased
/// - At most 254 characters
/// - Exactly one `@`, non-empty local part
/// - Domain contains a dot that is neither first nor last
/// - No whitespace
///
/// ## Example
/// ```rust
/// use aroma_core::validation::normalize_email;
///
/// assert_eq!(normalize_email(" Ana@Example.COM ").unwrap(), "ana@example.com");
/// assert!(normalize_email("ana@localhost").is_err());
/// ```
pub fn normalize_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing @"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must contain exactly one @ with a name before it"));
    }

    let dot_ok = domain
        .find('.')
        .map(|i| i > 0 && !domain.ends_with('.'))
        .unwrap_or(false);
    if !dot_ok {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(email)
}

/// Validates a display name (product, tier, bonus, partner).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query string; empty is allowed (lists everything).
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value (1..=99).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an order amount in cents (must be positive).
pub fn validate_order_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "orderAmount".to_string(),
        });
    }

    Ok(())
}

/// Validates a non-negative amount in cents (prices, minimums).
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_coupon_code() {
        assert_eq!(normalize_coupon_code("save20").unwrap(), "SAVE20");
        assert_eq!(normalize_coupon_code("  Welcome10 ").unwrap(), "WELCOME10");

        assert!(normalize_coupon_code("").is_err());
        assert!(normalize_coupon_code("   ").is_err());
        assert!(normalize_coupon_code("SAVE 20").is_err());
        assert!(normalize_coupon_code("ÉTÉ20").is_err());
        assert!(normalize_coupon_code(&"A".repeat(21)).is_err());
        assert!(normalize_coupon_code(&"A".repeat(20)).is_ok());
    }

    #[test]
    fn test_normalize_referral_code() {
        assert_eq!(normalize_referral_code("anna-x").unwrap(), "ANNA-X");
        assert!(normalize_referral_code("abc").is_err());
        assert!(normalize_referral_code("has space").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("Client@Parfum.FR").unwrap(),
            "client@parfum.fr"
        );

        assert!(normalize_email("").is_err());
        assert!(normalize_email("no-at-sign.com").is_err());
        assert!(normalize_email("@parfum.fr").is_err());
        assert!(normalize_email("a@b@parfum.fr").is_err());
        assert!(normalize_email("a@parfum").is_err());
        assert!(normalize_email("a@.fr").is_err());
        assert!(normalize_email("a@parfum.").is_err());
        assert!(normalize_email("a b@parfum.fr").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(99).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(100).is_err());
    }

    #[test]
    fn test_validate_bps() {
        assert!(validate_bps("rate", 0).is_ok());
        assert!(validate_bps("rate", 10_000).is_ok());
        assert!(validate_bps("rate", 10_001).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_order_amount(1).is_ok());
        assert!(validate_order_amount(0).is_err());
        assert!(validate_amount_cents("price", 0).is_ok());
        assert!(validate_amount_cents("price", -5).is_err());
    }

    #[test]
    fn test_validate_sku_and_name() {
        assert!(validate_sku("OUD-NOIR-50").is_ok());
        assert!(validate_sku("has space").is_err());
        assert!(validate_name("name", "Rose Absolue").is_ok());
        assert!(validate_name("name", " ").is_err());
    }
}
