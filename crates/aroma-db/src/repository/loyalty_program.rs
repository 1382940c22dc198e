//! # Loyalty Program Repository
//!
//! Admin-managed configuration: customer tiers and cashback bonuses.
//! Both are upserted by name, so the admin screen can save the whole table
//! without tracking ids.

use aroma_core::cashback::BonusInput;
use aroma_core::tier::TierInput;
use aroma_core::{CashbackBonus, CustomerTier};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct LoyaltyProgramRepository {
    pool: SqlitePool,
}

impl LoyaltyProgramRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyProgramRepository { pool }
    }

    /// All tiers, highest priority first.
    pub async fn list_tiers(&self) -> DbResult<Vec<CustomerTier>> {
        let tiers = sqlx::query_as::<_, CustomerTier>(
            r#"
            SELECT id, tier_name, cashback_bonus_bps, min_lifetime_purchases_cents, priority, is_active
            FROM customer_tiers
            ORDER BY priority DESC, min_lifetime_purchases_cents DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tiers)
    }

    /// Creates the tier or updates the one with the same name.
    pub async fn upsert_tier(&self, input: &TierInput) -> DbResult<CustomerTier> {
        input.validate()?;
        let name = input.tier_name.trim();

        sqlx::query(
            r#"
            INSERT INTO customer_tiers
                (id, tier_name, cashback_bonus_bps, min_lifetime_purchases_cents, priority, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (tier_name) DO UPDATE SET
                cashback_bonus_bps = excluded.cashback_bonus_bps,
                min_lifetime_purchases_cents = excluded.min_lifetime_purchases_cents,
                priority = excluded.priority,
                is_active = excluded.is_active
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(input.cashback_bonus_bps)
        .bind(input.min_lifetime_purchases_cents)
        .bind(input.priority)
        .bind(input.is_active)
        .execute(&self.pool)
        .await?;

        info!(tier = %name, bonus_bps = input.cashback_bonus_bps, "Tier saved");

        sqlx::query_as::<_, CustomerTier>(
            r#"
            SELECT id, tier_name, cashback_bonus_bps, min_lifetime_purchases_cents, priority, is_active
            FROM customer_tiers WHERE tier_name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Tier", name))
    }

    pub async fn list_bonuses(&self) -> DbResult<Vec<CashbackBonus>> {
        let bonuses = sqlx::query_as::<_, CashbackBonus>(
            "SELECT id, bonus_name, bonus_type, bonus_bps, is_active FROM cashback_bonuses ORDER BY bonus_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(bonuses)
    }

    /// Active bonuses only, as used at checkout.
    pub async fn active_bonuses(&self) -> DbResult<Vec<CashbackBonus>> {
        Ok(self
            .list_bonuses()
            .await?
            .into_iter()
            .filter(|b| b.is_active)
            .collect())
    }

    /// Creates the bonus or updates the one with the same name.
    pub async fn upsert_bonus(&self, input: &BonusInput) -> DbResult<CashbackBonus> {
        input.validate()?;
        let name = input.bonus_name.trim();

        sqlx::query(
            r#"
            INSERT INTO cashback_bonuses (id, bonus_name, bonus_type, bonus_bps, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (bonus_name) DO UPDATE SET
                bonus_type = excluded.bonus_type,
                bonus_bps = excluded.bonus_bps,
                is_active = excluded.is_active
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(input.bonus_type)
        .bind(input.bonus_bps)
        .bind(input.is_active)
        .execute(&self.pool)
        .await?;

        info!(bonus = %name, bonus_type = %input.bonus_type, "Bonus saved");

        sqlx::query_as::<_, CashbackBonus>(
            "SELECT id, bonus_name, bonus_type, bonus_bps, is_active FROM cashback_bonuses WHERE bonus_name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Bonus", name))
    }
}
