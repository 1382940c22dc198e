//! Storefront API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::str::FromStr;

use aroma_core::pricing::{PricingPolicy, TierBenefit};
use aroma_core::Percent;
use serde::{Deserialize, Serialize};

/// Storefront API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP server port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Secret used to verify session tokens
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Origins allowed to call the API. Empty allows any origin.
    pub allowed_origins: Vec<String>,

    /// Requests allowed per client per window on rate-limited endpoints
    pub rate_limit_max: u32,

    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,

    /// Whether the tier percentage is cashback or a discount
    pub tier_benefit: TierBenefit,

    /// Optional ceiling on the stacked cashback rate, in basis points
    pub cashback_cap_bps: Option<u32>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            port: 8080,
            database_path: "./aroma.db".to_string(),
            jwt_secret: "aroma-dev-secret-change-in-production".to_string(),
            jwt_lifetime_secs: 3600,
            allowed_origins: Vec::new(),
            rate_limit_max: 10,
            rate_limit_window_secs: 60,
            tier_benefit: TierBenefit::default(),
            cashback_cap_bps: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let config = ApiConfig {
            port: parse_var("AROMA_PORT", defaults.port)?,

            database_path: env::var("AROMA_DATABASE_PATH").unwrap_or(defaults.database_path),

            jwt_secret: env::var("AROMA_JWT_SECRET").unwrap_or(defaults.jwt_secret),

            jwt_lifetime_secs: parse_var("AROMA_JWT_LIFETIME_SECS", defaults.jwt_lifetime_secs)?,

            allowed_origins: env::var("AROMA_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),

            rate_limit_max: parse_var("AROMA_RATE_LIMIT_MAX", defaults.rate_limit_max)?,

            rate_limit_window_secs: parse_var(
                "AROMA_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            )?,

            tier_benefit: parse_var("AROMA_TIER_BENEFIT", defaults.tier_benefit)?,

            cashback_cap_bps: match env::var("AROMA_CASHBACK_CAP_BPS") {
                Ok(raw) => Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("AROMA_CASHBACK_CAP_BPS".to_string()))?,
                ),
                Err(_) => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "AROMA_JWT_SECRET (at least 16 characters)".to_string(),
            ));
        }
        if self.rate_limit_max == 0 || self.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidValue("AROMA_RATE_LIMIT_*".to_string()));
        }
        if matches!(self.cashback_cap_bps, Some(cap) if cap > 10_000) {
            return Err(ConfigError::InvalidValue("AROMA_CASHBACK_CAP_BPS".to_string()));
        }
        Ok(())
    }

    /// Store-wide pricing settings.
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            tier_benefit: self.tier_benefit,
            cashback_cap: self.cashback_cap_bps.map(Percent::from_bps),
        }
    }

    /// Whether `origin` may call origin-guarded endpoints.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Splits a comma-separated origin list, dropping blanks and trailing slashes.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
