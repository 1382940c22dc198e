//! # Loyalty Repository
//!
//! Customer loyalty accounts and the points / cashback ledger.
//!
//! ## Ledger Invariant
//! ```text
//! loyalty_ledger UNIQUE (order_id, entry_type)
//!
//!   order 42 paid       ──► redeem  -1000 pts      (once)
//!   order 42 delivered  ──► earn    +750 pts, +9.75 (once)
//!   order 42 cancelled  ──► refund  +1000 pts      (once, only if redeemed)
//! ```
//!
//! Every balance change happens in the same transaction as the ledger row
//! that explains it, and only when that row was actually inserted. Replaying
//! a transition therefore never double-credits.

use aroma_core::loyalty::AnnualClaim;
use aroma_core::{CoreError, LedgerEntry, LedgerEntryType, LoyaltyAccount, Money};
use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const ACCOUNT_COLUMNS: &str = "customer_id, points_balance, cashback_balance_cents, total_spent_cents, \
     auto_redeem_points, newsletter_subscribed, birthday, member_since, \
     last_birthday_claim_year, last_anniversary_claim_year, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    pub async fn get(&self, customer_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        let mut conn = self.pool.acquire().await?;
        fetch_account(&mut conn, customer_id).await
    }

    /// Returns the account, opening one (member since `today`) on first use.
    pub async fn get_or_create(&self, customer_id: &str, today: NaiveDate) -> DbResult<LoyaltyAccount> {
        let mut conn = self.pool.acquire().await?;
        ensure_account(&mut conn, customer_id, today).await
    }

    /// Updates customer preferences. `None` leaves a field unchanged.
    ///
    /// ## Errors
    /// * `BirthdayLocked` - a different birthday is already on file
    pub async fn update_preferences(
        &self,
        customer_id: &str,
        birthday: Option<NaiveDate>,
        auto_redeem_points: Option<bool>,
        today: NaiveDate,
    ) -> DbResult<LoyaltyAccount> {
        let mut conn = self.pool.acquire().await?;
        let account = ensure_account(&mut conn, customer_id, today).await?;
        if let Some(birthday) = birthday {
            account.check_birthday_change(birthday)?;
        }

        sqlx::query(
            r#"
            UPDATE loyalty_accounts SET
                birthday = COALESCE(birthday, ?2),
                auto_redeem_points = COALESCE(?3, auto_redeem_points),
                updated_at = ?4
            WHERE customer_id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(birthday)
        .bind(auto_redeem_points)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        fetch_account(&mut conn, customer_id)
            .await?
            .ok_or_else(|| DbError::not_found("Loyalty account", customer_id))
    }

    pub async fn set_newsletter_subscribed(
        &self,
        customer_id: &str,
        subscribed: bool,
        today: NaiveDate,
    ) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        ensure_account(&mut conn, customer_id, today).await?;

        sqlx::query(
            "UPDATE loyalty_accounts SET newsletter_subscribed = ?2, updated_at = ?3 WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .bind(subscribed)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Most recent ledger entries first.
    pub async fn ledger(&self, customer_id: &str, limit: u32) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, customer_id, order_id, entry_type, points_delta, cashback_delta_cents, created_at
            FROM loyalty_ledger
            WHERE customer_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn fetch_account(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Option<LoyaltyAccount>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM loyalty_accounts WHERE customer_id = ?1");

    let account = sqlx::query_as::<_, LoyaltyAccount>(&sql)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(account)
}

pub(crate) async fn ensure_account(
    conn: &mut SqliteConnection,
    customer_id: &str,
    today: NaiveDate,
) -> DbResult<LoyaltyAccount> {
    let now = Utc::now();

    let created = sqlx::query(
        r#"
        INSERT OR IGNORE INTO loyalty_accounts (customer_id, member_since, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?3)
        "#,
    )
    .bind(customer_id)
    .bind(today)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if created.rows_affected() > 0 {
        info!(customer_id = %customer_id, "Loyalty account opened");
    }

    fetch_account(conn, customer_id)
        .await?
        .ok_or_else(|| DbError::not_found("Loyalty account", customer_id))
}

/// Records an annual claim for `year`. Fails if it was already recorded,
/// even by a concurrent request.
pub(crate) async fn record_claim(
    conn: &mut SqliteConnection,
    customer_id: &str,
    claim: AnnualClaim,
    year: i32,
) -> DbResult<()> {
    let sql = match claim {
        AnnualClaim::Birthday => {
            r#"
            UPDATE loyalty_accounts SET last_birthday_claim_year = ?2, updated_at = ?3
            WHERE customer_id = ?1
            AND (last_birthday_claim_year IS NULL OR last_birthday_claim_year <> ?2)
            "#
        }
        AnnualClaim::Anniversary => {
            r#"
            UPDATE loyalty_accounts SET last_anniversary_claim_year = ?2, updated_at = ?3
            WHERE customer_id = ?1
            AND (last_anniversary_claim_year IS NULL OR last_anniversary_claim_year <> ?2)
            "#
        }
    };

    let result = sqlx::query(sql)
        .bind(customer_id)
        .bind(year)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::AlreadyClaimed {
            claim: claim.as_str().to_string(),
            year,
        }
        .into());
    }

    debug!(customer_id = %customer_id, claim = claim.as_str(), year, "Annual bonus claimed");
    Ok(())
}

/// Records an annual claim made by an order, remembering the account's
/// previous claim year so [`release_claims`] can restore it.
pub(crate) async fn claim_for_order(
    conn: &mut SqliteConnection,
    customer_id: &str,
    order_id: &str,
    claim: AnnualClaim,
    year: i32,
) -> DbResult<()> {
    let previous_year = fetch_account(conn, customer_id)
        .await?
        .and_then(|a| match claim {
            AnnualClaim::Birthday => a.last_birthday_claim_year,
            AnnualClaim::Anniversary => a.last_anniversary_claim_year,
        });

    record_claim(conn, customer_id, claim, year).await?;

    sqlx::query(
        r#"
        INSERT INTO order_claims (order_id, customer_id, claim, claim_year, previous_year, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(order_id)
    .bind(customer_id)
    .bind(claim.as_str())
    .bind(year)
    .bind(previous_year)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Gives back the annual claims of a cancelled order.
///
/// The account is only reset while it still holds the order's claim year,
/// and the claim rows are removed, so releasing twice is a no-op.
pub(crate) async fn release_claims(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    for claim in [AnnualClaim::Birthday, AnnualClaim::Anniversary] {
        let row: Option<(String, i32, Option<i32>)> = sqlx::query_as(
            "SELECT customer_id, claim_year, previous_year FROM order_claims WHERE order_id = ?1 AND claim = ?2",
        )
        .bind(order_id)
        .bind(claim.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        let Some((customer_id, claim_year, previous_year)) = row else {
            continue;
        };

        let sql = match claim {
            AnnualClaim::Birthday => {
                r#"
                UPDATE loyalty_accounts SET last_birthday_claim_year = ?3, updated_at = ?4
                WHERE customer_id = ?1 AND last_birthday_claim_year = ?2
                "#
            }
            AnnualClaim::Anniversary => {
                r#"
                UPDATE loyalty_accounts SET last_anniversary_claim_year = ?3, updated_at = ?4
                WHERE customer_id = ?1 AND last_anniversary_claim_year = ?2
                "#
            }
        };

        sqlx::query(sql)
            .bind(&customer_id)
            .bind(claim_year)
            .bind(previous_year)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        debug!(order_id = %order_id, claim = claim.as_str(), year = claim_year, "Annual bonus released");
    }

    sqlx::query("DELETE FROM order_claims WHERE order_id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Inserts a ledger entry unless one of the same type exists for the order.
/// Returns whether it was inserted.
async fn insert_entry(
    conn: &mut SqliteConnection,
    customer_id: &str,
    order_id: &str,
    entry_type: LedgerEntryType,
    points_delta: i64,
    cashback_delta: Money,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO loyalty_ledger
            (id, customer_id, order_id, entry_type, points_delta, cashback_delta_cents, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(customer_id)
    .bind(order_id)
    .bind(entry_type)
    .bind(points_delta)
    .bind(cashback_delta.cents())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Debits points redeemed on an order.
pub(crate) async fn debit_points(
    conn: &mut SqliteConnection,
    customer_id: &str,
    order_id: &str,
    points: i64,
) -> DbResult<()> {
    if points <= 0 || !insert_entry(conn, customer_id, order_id, LedgerEntryType::Redeem, -points, Money::zero()).await? {
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE loyalty_accounts SET points_balance = points_balance - ?2, updated_at = ?3
        WHERE customer_id = ?1 AND points_balance >= ?2
        "#,
    )
    .bind(customer_id)
    .bind(points)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available = fetch_account(conn, customer_id)
            .await?
            .map(|a| a.points_balance)
            .unwrap_or(0);
        return Err(CoreError::InsufficientPoints {
            available,
            requested: points,
        }
        .into());
    }

    Ok(())
}

/// Returns points debited for an order, if they were debited.
pub(crate) async fn refund_points(
    conn: &mut SqliteConnection,
    customer_id: &str,
    order_id: &str,
) -> DbResult<()> {
    let redeemed: Option<i64> = sqlx::query_scalar(
        "SELECT -points_delta FROM loyalty_ledger WHERE order_id = ?1 AND entry_type = 'redeem'",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(points) = redeemed.filter(|p| *p > 0) else {
        return Ok(());
    };

    if insert_entry(conn, customer_id, order_id, LedgerEntryType::Refund, points, Money::zero()).await? {
        sqlx::query(
            "UPDATE loyalty_accounts SET points_balance = points_balance + ?2, updated_at = ?3 WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .bind(points)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        debug!(order_id = %order_id, points, "Points refunded");
    }

    Ok(())
}

/// Credits a delivered order: purchase points, cashback and lifetime spend.
pub(crate) async fn credit_purchase(
    conn: &mut SqliteConnection,
    customer_id: &str,
    order_id: &str,
    points: i64,
    cashback: Money,
    spend: Money,
) -> DbResult<bool> {
    if !insert_entry(conn, customer_id, order_id, LedgerEntryType::Earn, points, cashback).await? {
        return Ok(false);
    }

    sqlx::query(
        r#"
        UPDATE loyalty_accounts SET
            points_balance = points_balance + ?2,
            cashback_balance_cents = cashback_balance_cents + ?3,
            total_spent_cents = total_spent_cents + ?4,
            updated_at = ?5
        WHERE customer_id = ?1
        "#,
    )
    .bind(customer_id)
    .bind(points)
    .bind(cashback.cents())
    .bind(spend.cents())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    info!(
        customer_id = %customer_id,
        order_id = %order_id,
        points,
        cashback = %cashback,
        "Purchase credited"
    );
    Ok(true)
}

// =============================================================================
// Unit Tests
// =============================================================================
