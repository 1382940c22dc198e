//! # Newsletter Repository
//!
//! Newsletter signups. A signup by a logged-in customer also marks their
//! loyalty account as subscribed, which unlocks the newsletter cashback bonus.

use aroma_core::validation::normalize_email;
use aroma_core::NewsletterSubscriber;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::loyalty::ensure_account;

#[derive(Debug, Clone)]
pub struct NewsletterRepository {
    pool: SqlitePool,
}

impl NewsletterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NewsletterRepository { pool }
    }

    /// Subscribes an address.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - address already subscribed
    /// * `Err(DbError::Domain(_))` - malformed address
    pub async fn subscribe(
        &self,
        raw_email: &str,
        customer_id: Option<&str>,
        today: NaiveDate,
    ) -> DbResult<NewsletterSubscriber> {
        let email = normalize_email(raw_email)?;

        let subscriber = NewsletterSubscriber {
            id: Uuid::new_v4().to_string(),
            email,
            customer_id: customer_id.map(str::to_string),
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO newsletter_subscribers (id, email, customer_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&subscriber.id)
        .bind(&subscriber.email)
        .bind(&subscriber.customer_id)
        .bind(subscriber.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", subscriber.email.clone()),
            other => other,
        })?;

        if let Some(customer_id) = customer_id {
            ensure_account(&mut tx, customer_id, today).await?;
            sqlx::query(
                "UPDATE loyalty_accounts SET newsletter_subscribed = 1, updated_at = ?2 WHERE customer_id = ?1",
            )
            .bind(customer_id)
            .bind(subscriber.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(linked = customer_id.is_some(), "Newsletter signup");
        Ok(subscriber)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM newsletter_subscribers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_normalizes_and_rejects_duplicates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.newsletter();

        let sub = repo.subscribe(" Ana@Example.com ", None, today()).await.unwrap();
        assert_eq!(sub.email, "ana@example.com");

        let err = repo.subscribe("ana@EXAMPLE.com", None, today()).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_marks_account() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.newsletter()
            .subscribe("ana@example.com", Some("cust-ana"), today())
            .await
            .unwrap();

        let account = db.loyalty().get("cust-ana").await.unwrap().unwrap();
        assert!(account.newsletter_subscribed);
    }

    #[tokio::test]
    async fn test_invalid_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .newsletter()
            .subscribe("not-an-email", None, today())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(_)));
    }
}
