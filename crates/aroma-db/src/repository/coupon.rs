//! # Coupon Repository
//!
//! Coupon storage and the atomic usage counter.
//!
//! ## Redemption
//! ```text
//! order → paid (inside the order transaction)
//!    │
//!    ├── INSERT coupon_redemptions (order_id PK)      at most once per order
//!    │
//!    └── UPDATE coupons SET current_uses = current_uses + 1
//!        WHERE code = ? AND (max_uses IS NULL OR current_uses < max_uses)
//!              │
//!              └── 0 rows → UsageExceeded, whole transaction rolls back
//! ```
//!
//! Two orders racing for the last use cannot both succeed: SQLite serializes
//! the writes and the second UPDATE sees the incremented counter.

use aroma_core::coupon::{validate_coupon, CouponDiscount, NewCoupon};
use aroma_core::validation::normalize_coupon_code;
use aroma_core::{Coupon, CouponError, Money};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, min_order_amount_cents, \
     max_uses, current_uses, valid_from, valid_until, is_active, created_at, updated_at";

/// Repository for coupons.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Gets a coupon by its normalized code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1");

        let coupon = sqlx::query_as::<_, Coupon>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coupon)
    }

    pub async fn list(&self) -> DbResult<Vec<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC");

        Ok(sqlx::query_as::<_, Coupon>(&sql).fetch_all(&self.pool).await?)
    }

    /// Validates a customer-entered code against an order amount.
    ///
    /// Read-only: the usage counter only moves when an order is paid.
    pub async fn validate(
        &self,
        raw_code: &str,
        order_amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<CouponDiscount> {
        let code = normalize_coupon_code(raw_code)?;
        let coupon = self.get_by_code(&code).await?;

        let result = validate_coupon(&code, coupon.as_ref(), order_amount, now);
        match &result {
            Ok(discount) => debug!(code = %code, discount = %discount.discount, "Coupon accepted"),
            Err(err) => debug!(code = %code, reason = err.reason(), "Coupon rejected"),
        }

        Ok(result?)
    }

    /// Creates a coupon from validated admin input.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(&self, input: NewCoupon) -> DbResult<Coupon> {
        let input = input.validated()?;
        let now = Utc::now();

        let coupon = Coupon {
            id: Uuid::new_v4().to_string(),
            code: input.code,
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            min_order_amount_cents: input.min_order_amount_cents,
            max_uses: input.max_uses,
            current_uses: 0,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, discount_value, min_order_amount_cents,
                max_uses, current_uses, valid_from, valid_until, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.min_order_amount_cents)
        .bind(coupon.max_uses)
        .bind(coupon.current_uses)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", coupon.code.clone()),
            other => other,
        })?;

        info!(code = %coupon.code, "Coupon created");
        Ok(coupon)
    }

    /// Activates or deactivates a coupon.
    pub async fn set_active(&self, raw_code: &str, active: bool) -> DbResult<Coupon> {
        let code = normalize_coupon_code(raw_code)?;

        let result = sqlx::query("UPDATE coupons SET is_active = ?2, updated_at = ?3 WHERE code = ?1")
            .bind(&code)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", code));
        }

        info!(code = %code, active, "Coupon toggled");
        self.get_by_code(&code)
            .await?
            .ok_or_else(|| DbError::not_found("Coupon", code))
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Counts one use of `code` for `order_id`. A second call for the same
/// order is a no-op.
pub(crate) async fn redeem(
    conn: &mut SqliteConnection,
    code: &str,
    order_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let recorded = sqlx::query(
        "INSERT OR IGNORE INTO coupon_redemptions (order_id, coupon_code, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(order_id)
    .bind(code)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if recorded.rows_affected() == 0 {
        debug!(order_id = %order_id, "Coupon already redeemed for order");
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE coupons SET current_uses = current_uses + 1, updated_at = ?2
        WHERE code = ?1 AND (max_uses IS NULL OR current_uses < max_uses)
        "#,
    )
    .bind(code)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let max_uses: Option<Option<i64>> = sqlx::query_scalar("SELECT max_uses FROM coupons WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        warn!(code = %code, order_id = %order_id, "Coupon usage limit reached at payment");
        return Err(match max_uses {
            Some(max) => CouponError::UsageExceeded {
                code: code.to_string(),
                max_uses: max.unwrap_or(0),
            },
            None => CouponError::NotFound {
                code: code.to_string(),
            },
        }
        .into());
    }

    Ok(())
}

/// Gives back the use counted for `order_id`, if any.
pub(crate) async fn release(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    let code: Option<String> = sqlx::query_scalar(
        "DELETE FROM coupon_redemptions WHERE order_id = ?1 RETURNING coupon_code",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(code) = code {
        sqlx::query(
            "UPDATE coupons SET current_uses = current_uses - 1, updated_at = ?2 WHERE code = ?1 AND current_uses > 0",
        )
        .bind(&code)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        debug!(code = %code, order_id = %order_id, "Coupon use released");
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
