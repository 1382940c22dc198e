//! Error types for the Storefront API.
//!
//! Every error leaves the service as
//! `{"error": {"code": "...", "message": "..."}}` with a matching status.
//! Database failures are logged here and replaced by a generic message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use aroma_core::{CoreError, CouponError, ValidationError};
use aroma_db::DbError;

/// Storefront API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// A business rule rejected the request.
    #[error("{message}")]
    Domain { code: &'static str, message: String },

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Domain { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Domain { code, .. } => *code,
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Internal error");
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<CouponError> for ApiError {
    fn from(err: CouponError) -> Self {
        let code = match err {
            CouponError::NotFound { .. } => "coupon_not_found",
            CouponError::NotYetValid { .. } => "coupon_not_yet_valid",
            CouponError::Expired { .. } => "coupon_expired",
            CouponError::BelowMinimum { .. } => "coupon_below_minimum",
            CouponError::UsageExceeded { .. } => "coupon_usage_exceeded",
        };
        ApiError::Domain {
            code,
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ProductNotFound(_) => return ApiError::NotFound(err.to_string()),
            CoreError::InvalidOrderTransition { .. } => return ApiError::Conflict(err.to_string()),
            CoreError::Coupon(coupon) => return coupon.clone().into(),
            CoreError::Validation(_) => return ApiError::Validation(err.to_string()),
            CoreError::InsufficientStock { .. } => "insufficient_stock",
            CoreError::EmptyOrder => "empty_order",
            CoreError::OrderTooLarge { .. } | CoreError::QuantityTooLarge { .. } => "order_too_large",
            CoreError::InsufficientPoints { .. } => "insufficient_points",
            CoreError::AlreadyClaimed { .. } => "already_claimed",
            CoreError::NotEligible { .. } => "not_eligible",
            CoreError::BirthdayLocked => "birthday_locked",
        };
        ApiError::Domain {
            code,
            message: err.to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::Conflict(err.to_string()),
            DbError::ForeignKeyViolation { .. } => ApiError::Validation(err.to_string()),
            DbError::Domain(core) => core.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = DbError::duplicate("email", "ana@example.com").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = DbError::Domain(CoreError::InvalidOrderTransition {
            from: "paid".to_string(),
            to: "delivered".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = CouponError::Expired {
            code: "SAVE20".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "coupon_expired");

        let err: ApiError = DbError::QueryFailed("disk I/O error".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
