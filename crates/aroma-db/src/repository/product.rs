//! # Product Repository
//!
//! Database operations for the perfume catalog.
//!
//! ## FTS5 Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How FTS5 Search Works                                │
//! │                                                                         │
//! │  Customer types: "oud noir"                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fts_query() ──► "oud"* "noir"*     (tokens quoted, prefix match)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────┐                   │
//! │  │ products_fts (virtual table)                    │                   │
//! │  │                                                 │                   │
//! │  │ OUD-NOIR-50  | Oud Noir EDP 50ml  | Maison Ka   │ ← MATCH!          │
//! │  │ OUD-NOIR-100 | Oud Noir EDP 100ml | Maison Ka   │ ← MATCH!          │
//! │  │ ROSE-30      | Rose Absolue 30ml  | Atelier V   │                   │
//! │  └─────────────────────────────────────────────────┘                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Results ordered by rank, inactive products filtered out               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use aroma_core::validation::{validate_amount_cents, validate_name, validate_sku};
use aroma_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str = "p.id, p.sku, p.name, p.brand, p.description, p.volume_ml, \
     p.price_cents, p.sale_price_cents, p.cashback_bps, p.stock, p.is_active, \
     p.created_at, p.updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches active products using full-text search over SKU, name and
    /// brand. An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        debug!(query = %query, limit = %limit, "Searching products");

        let Some(fts_query) = fts_query(query) else {
            return self.list_active(limit).await;
        };

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            INNER JOIN products_fts fts ON p.rowid = fts.rowid
            WHERE products_fts MATCH ?1
            AND p.is_active = 1
            ORDER BY rank
            LIMIT ?2
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(fts_query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.is_active = 1 ORDER BY p.name LIMIT ?1"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Lists every product, active or not (inventory views).
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p ORDER BY p.sku");

        Ok(sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.sku = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain)` - malformed SKU, blank name or negative price
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_sku(&product.sku)?;
        validate_name("name", &product.name)?;
        validate_amount_cents("priceCents", product.price_cents)?;

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, brand, description, volume_ml,
                price_cents, sale_price_cents, cashback_bps, stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.description)
        .bind(product.volume_ml)
        .bind(product.price_cents)
        .bind(product.sale_price_cents)
        .bind(product.cashback_bps)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Takes `quantity` units out of stock, failing instead of going negative.
pub(crate) async fn reserve_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    sku: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND is_active = 1 AND stock >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

        return Err(match available {
            Some(available) => CoreError::InsufficientStock {
                sku: sku.to_string(),
                available,
                requested: quantity,
            },
            None => CoreError::ProductNotFound(product_id.to_string()),
        }
        .into());
    }

    Ok(())
}

/// Puts `quantity` units back (cancelled order).
pub(crate) async fn release_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Turns free text into an FTS5 prefix query, quoting every token so
/// punctuation in the input cannot break the MATCH syntax.
fn fts_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"*", t))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use chrono::Utc;
    use uuid::Uuid;

    pub(crate) fn perfume(sku: &str, name: &str, brand: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            description: None,
            volume_ml: Some(50),
            price_cents,
            sale_price_cents: None,
            cashback_bps: 500,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fts_query() {
        assert_eq!(fts_query("oud noir").unwrap(), "\"oud\"* \"noir\"*");
        assert_eq!(fts_query("  OUD-50 ").unwrap(), "\"OUD\"* \"50\"*");
        assert!(fts_query(" \"* ").is_none());
    }

    #[tokio::test]
    async fn test_insert_and_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&perfume("OUD-NOIR-50", "Oud Noir EDP 50ml", "Maison Kael", 12_900, 5))
            .await
            .unwrap();
        repo.insert(&perfume("ROSE-30", "Rose Absolue 30ml", "Atelier Vert", 6_500, 5))
            .await
            .unwrap();

        let found = repo.search("oud", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sku, "OUD-NOIR-50");

        let by_brand = repo.search("atelier", 10).await.unwrap();
        assert_eq!(by_brand[0].sku, "ROSE-30");

        assert_eq!(repo.search("", 10).await.unwrap().len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&perfume("ROSE-30", "Rose", "Atelier Vert", 6_500, 1))
            .await
            .unwrap();
        let err = repo
            .insert(&perfume("ROSE-30", "Rose again", "Atelier Vert", 6_500, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_insert_rejects_malformed_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let err = repo
            .insert(&perfume("OUD NOIR 50", "Oud Noir", "Maison Kael", 12_900, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let err = repo
            .insert(&perfume("OUD-NOIR-50", "  ", "Maison Kael", 12_900, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let err = repo
            .insert(&perfume("OUD-NOIR-50", "Oud Noir", "Maison Kael", -1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reserve_stock_never_goes_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = perfume("VETIVER-100", "Vetiver 100ml", "Maison Kael", 9_900, 2);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        reserve_stock(&mut conn, &product.id, &product.sku, 2).await.unwrap();
        let err = reserve_stock(&mut conn, &product.id, &product.sku, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, .. })
        ));

        release_stock(&mut conn, &product.id, 2).await.unwrap();
        drop(conn);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 2);
    }
}
