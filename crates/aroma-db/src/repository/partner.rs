//! # Partner Repository
//!
//! Referral partners and the commissions they earn on delivered orders.

use aroma_core::referral::commission_for;
use aroma_core::validation::{normalize_referral_code, validate_bps, validate_name};
use aroma_core::{Money, Partner};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const PARTNER_COLUMNS: &str = "id, name, referral_code, commission_bps, is_active, created_at";

/// Admin input for a new partner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPartner {
    pub name: String,
    pub referral_code: String,
    pub commission_bps: u32,
}

#[derive(Debug, Clone)]
pub struct PartnerRepository {
    pool: SqlitePool,
}

impl PartnerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartnerRepository { pool }
    }

    /// Creates a partner.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - referral code already taken
    pub async fn insert(&self, input: NewPartner) -> DbResult<Partner> {
        validate_name("name", &input.name)?;
        validate_bps("commission_bps", input.commission_bps)?;
        let referral_code = normalize_referral_code(&input.referral_code)?;

        let partner = Partner {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            referral_code,
            commission_bps: input.commission_bps,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO partners (id, name, referral_code, commission_bps, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&partner.id)
        .bind(&partner.name)
        .bind(&partner.referral_code)
        .bind(partner.commission_bps)
        .bind(partner.is_active)
        .bind(partner.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("referral_code", partner.referral_code.clone())
            }
            other => other,
        })?;

        info!(partner = %partner.name, code = %partner.referral_code, "Partner created");
        Ok(partner)
    }

    /// Looks up an active partner by a customer-entered referral code.
    /// Malformed codes simply find nothing.
    pub async fn get_active_by_code(&self, raw_code: &str) -> DbResult<Option<Partner>> {
        let Ok(code) = normalize_referral_code(raw_code) else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        fetch_active_by_code(&mut conn, &code).await
    }

    pub async fn list(&self) -> DbResult<Vec<Partner>> {
        let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners ORDER BY name");
        Ok(sqlx::query_as::<_, Partner>(&sql).fetch_all(&self.pool).await?)
    }

    /// Total commission recorded for a partner.
    pub async fn commission_total(&self, partner_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM partner_commissions WHERE partner_id = ?1",
        )
        .bind(partner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_active_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Partner>> {
    let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners WHERE referral_code = ?1 AND is_active = 1");

    let partner = sqlx::query_as::<_, Partner>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(partner)
}

/// Records the commission for a delivered order placed with `referral_code`.
/// Returns the amount, or `None` when the code no longer belongs to an
/// active partner or the commission was already recorded.
pub(crate) async fn record_commission(
    conn: &mut SqliteConnection,
    referral_code: &str,
    order_id: &str,
    final_price: Money,
    now: DateTime<Utc>,
) -> DbResult<Option<Money>> {
    let Some(partner) = fetch_active_by_code(conn, referral_code).await? else {
        debug!(code = %referral_code, order_id = %order_id, "No active partner for referral code");
        return Ok(None);
    };

    let amount = commission_for(&partner, final_price);

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO partner_commissions (order_id, partner_id, amount_cents, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(order_id)
    .bind(&partner.id)
    .bind(amount.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    info!(partner = %partner.name, order_id = %order_id, commission = %amount, "Partner commission recorded");
    Ok(Some(amount))
}

// =============================================================================
// Unit Tests
// =============================================================================
