//! # Order Repository
//!
//! Order placement and the status machine, with every loyalty, coupon,
//! stock and partner side effect applied in the same transaction as the
//! status change.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  place()            pending_payment                                    │
//! │                     └── reserve stock, record birthday/anniversary     │
//! │                                                                         │
//! │  transition(Paid)   paid                                               │
//! │                     └── redeem coupon use, debit redeemed points       │
//! │                                                                         │
//! │                     processing → shipped                               │
//! │                                                                         │
//! │  transition(Delivered)                                                 │
//! │                     └── credit points + cashback + total_spent,        │
//! │                         record partner commission                      │
//! │                                                                         │
//! │  transition(Cancelled)  (from any non-terminal state)                  │
//! │                     └── release stock and birthday/anniversary;        │
//! │                         if paid: release coupon use, refund points     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status change itself is a compare-and-set on the status read at the
//! start of the transaction, so two admins moving the same order cannot both
//! win.

use aroma_core::loyalty::AnnualClaim;
use aroma_core::order::OrderLine;
use aroma_core::pricing::PriceQuote;
use aroma_core::{CoreError, Money, Order, OrderItem, OrderStatus};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{coupon, loyalty, partner, product};

const ORDER_COLUMNS: &str = "id, customer_id, status, subtotal_cents, coupon_code, coupon_discount_cents, \
     tier_discount_cents, points_redeemed, points_discount_cents, total_cents, cashback_bps, \
     cashback_cents, points_earned, tier_name, referral_code, created_at, updated_at, \
     paid_at, delivered_at, cancelled_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, sku_snapshot, name_snapshot, unit_price_cents, \
     quantity, line_total_cents, cashback_bps, created_at";

/// Everything needed to persist a priced order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: String,
    pub lines: Vec<OrderLine>,
    pub quote: PriceQuote,
    /// Normalized referral code of an active partner.
    pub referral_code: Option<String>,
    /// Annual bonuses the quote applied; claimed at placement, given back
    /// if the order is cancelled.
    pub claims: Vec<AnnualClaim>,
    pub today: NaiveDate,
}

impl NewOrder {
    /// Builds the order, deriving the annual claims from the bonuses the
    /// quote actually applied.
    pub fn new(
        customer_id: impl Into<String>,
        lines: Vec<OrderLine>,
        quote: PriceQuote,
        referral_code: Option<String>,
        today: NaiveDate,
    ) -> Self {
        let claims = quote
            .cashback
            .bonuses
            .iter()
            .filter_map(|b| AnnualClaim::from_bonus_type(b.bonus_type))
            .collect();

        NewOrder {
            customer_id: customer_id.into(),
            lines,
            quote,
            referral_code,
            claims,
            today,
        }
    }
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Units of a product sold (paid and not cancelled) since a cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: String,
    pub sku: String,
    pub stock: i64,
    pub units_sold: i64,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Persists a priced order in `pending_payment`.
    ///
    /// Opens the customer's loyalty account if needed, records annual
    /// claims, and reserves stock for every line. Any failure rolls the
    /// whole order back.
    pub async fn place(&self, new_order: NewOrder) -> DbResult<OrderWithItems> {
        if new_order.lines.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        let now = Utc::now();
        let quote = &new_order.quote;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: new_order.customer_id.clone(),
            status: OrderStatus::PendingPayment,
            subtotal_cents: quote.subtotal.cents(),
            coupon_code: quote.coupon_code.clone(),
            coupon_discount_cents: quote.coupon_discount.cents(),
            tier_discount_cents: quote.tier_discount.cents(),
            points_redeemed: quote.points_redeemed,
            points_discount_cents: quote.points_discount.cents(),
            total_cents: quote.total.cents(),
            cashback_bps: quote.cashback.total.bps(),
            cashback_cents: quote.cashback_amount.cents(),
            points_earned: quote.points_earned,
            tier_name: quote.tier_name.clone(),
            referral_code: new_order.referral_code.clone(),
            created_at: now,
            updated_at: now,
            paid_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        let mut tx = self.pool.begin().await?;

        loyalty::ensure_account(&mut tx, &order.customer_id, new_order.today).await?;

        insert_order(&mut tx, &order).await?;

        for claim in &new_order.claims {
            loyalty::claim_for_order(&mut tx, &order.customer_id, &order.id, *claim, new_order.today.year())
                .await?;
        }

        let mut items = Vec::with_capacity(new_order.lines.len());
        for line in &new_order.lines {
            product::reserve_stock(&mut tx, &line.product_id, &line.sku, line.quantity).await?;

            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price.cents(),
                quantity: line.quantity,
                line_total_cents: line.line_total().cents(),
                cashback_bps: line.cashback.bps(),
                created_at: now,
            };
            insert_item(&mut tx, &item).await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total = %quote.total,
            lines = items.len(),
            "Order placed"
        );

        Ok(OrderWithItems { order, items })
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Gets an order together with its items.
    pub async fn get_with_items(&self, id: &str) -> DbResult<Option<OrderWithItems>> {
        let Some(order) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;

        Ok(Some(OrderWithItems { order, items }))
    }

    /// Gets the items of an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY created_at, sku_snapshot");

        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// A customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(customer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Units sold per active product on orders placed since `cutoff` that
    /// reached `paid` and were not cancelled.
    pub async fn units_sold_since(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<ProductSales>> {
        let sales = sqlx::query_as::<_, ProductSales>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku AS sku,
                p.stock AS stock,
                COALESCE(SUM(CASE WHEN o.id IS NOT NULL THEN oi.quantity ELSE 0 END), 0) AS units_sold
            FROM products p
            LEFT JOIN order_items oi ON oi.product_id = p.id
            LEFT JOIN orders o ON o.id = oi.order_id
                AND o.status NOT IN ('pending_payment', 'cancelled')
                AND o.created_at >= ?1
            WHERE p.is_active = 1
            GROUP BY p.id, p.sku, p.stock
            ORDER BY p.sku
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Moves an order to `to` and applies the side effects of the move.
    ///
    /// ## Errors
    /// * `NotFound` - no such order
    /// * `InvalidOrderTransition` - not a legal move, or the order changed
    ///   concurrently
    /// * `UsageExceeded` / `InsufficientPoints` - paying would exceed the
    ///   coupon cap or the points balance; nothing is changed
    pub async fn transition(&self, order_id: &str, to: OrderStatus, now: DateTime<Utc>) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;
        let from = order.status;

        from.transition(to)?;
        compare_and_set_status(&mut tx, &order, to, now).await?;

        match to {
            OrderStatus::Paid => {
                if let Some(code) = &order.coupon_code {
                    coupon::redeem(&mut tx, code, &order.id, now).await?;
                }
                loyalty::debit_points(&mut tx, &order.customer_id, &order.id, order.points_redeemed).await?;
            }
            OrderStatus::Delivered => {
                loyalty::credit_purchase(
                    &mut tx,
                    &order.customer_id,
                    &order.id,
                    order.points_earned,
                    Money::from_cents(order.cashback_cents),
                    order.total(),
                )
                .await?;

                if let Some(code) = &order.referral_code {
                    partner::record_commission(&mut tx, code, &order.id, order.total(), now).await?;
                }
            }
            OrderStatus::Cancelled => {
                if from.is_paid() {
                    coupon::release(&mut tx, &order.id).await?;
                    loyalty::refund_points(&mut tx, &order.customer_id, &order.id).await?;
                }
                loyalty::release_claims(&mut tx, &order.id).await?;
                release_items(&mut tx, &order.id).await?;
            }
            OrderStatus::PendingPayment | OrderStatus::Processing | OrderStatus::Shipped => {}
        }

        let updated = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        tx.commit().await?;

        info!(order_id = %order_id, from = %from, to = %to, "Order status changed");
        Ok(updated)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");

    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_id, status, subtotal_cents, coupon_code, coupon_discount_cents,
            tier_discount_cents, points_redeemed, points_discount_cents, total_cents,
            cashback_bps, cashback_cents, points_earned, tier_name, referral_code,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(order.status)
    .bind(order.subtotal_cents)
    .bind(&order.coupon_code)
    .bind(order.coupon_discount_cents)
    .bind(order.tier_discount_cents)
    .bind(order.points_redeemed)
    .bind(order.points_discount_cents)
    .bind(order.total_cents)
    .bind(order.cashback_bps)
    .bind(order.cashback_cents)
    .bind(order.points_earned)
    .bind(&order.tier_name)
    .bind(&order.referral_code)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, sku_snapshot, name_snapshot,
            unit_price_cents, quantity, line_total_cents, cashback_bps, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.cashback_bps)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes the new status only if the order is still in the status it was
/// read with.
async fn compare_and_set_status(
    conn: &mut SqliteConnection,
    order: &Order,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let stamp = match to {
        OrderStatus::Paid => ", paid_at = ?3",
        OrderStatus::Delivered => ", delivered_at = ?3",
        OrderStatus::Cancelled => ", cancelled_at = ?3",
        OrderStatus::PendingPayment | OrderStatus::Processing | OrderStatus::Shipped => "",
    };
    let sql = format!("UPDATE orders SET status = ?2, updated_at = ?3{stamp} WHERE id = ?1 AND status = ?4");

    let result = sqlx::query(&sql)
        .bind(&order.id)
        .bind(to)
        .bind(now)
        .bind(order.status)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        warn!(order_id = %order.id, expected = %order.status, "Order changed concurrently");
        return Err(CoreError::InvalidOrderTransition {
            from: order.status.to_string(),
            to: to.to_string(),
        }
        .into());
    }

    Ok(())
}

async fn release_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    let lines: Vec<(String, i64)> =
        sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE order_id = ?1")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

    for (product_id, quantity) in &lines {
        product::release_stock(conn, product_id, *quantity).await?;
    }

    debug!(order_id = %order_id, lines = lines.len(), "Stock released");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::partner::NewPartner;
    use crate::repository::product::tests::perfume;
    use crate::{Database, DbConfig};
    use aroma_core::coupon::{CouponDiscount, NewCoupon};
    use aroma_core::order::OrderDraft;
    use aroma_core::pricing::{calculate_price, PointsRedemption, PriceRequest, PricingPolicy};
    use aroma_core::tier::ResolvedTier;
    use aroma_core::{BonusType, CouponError, DiscountType, Percent, Product};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    async fn stocked(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        let product = perfume(sku, &format!("{sku} EDP"), "Maison Kael", price_cents, stock);
        db.products().insert(&product).await.unwrap();
        product
    }

    fn new_order(
        customer: &str,
        product: &Product,
        qty: i64,
        coupon: Option<&CouponDiscount>,
        points_balance: i64,
        redemption: PointsRedemption,
        referral_code: Option<&str>,
    ) -> NewOrder {
        let mut draft = OrderDraft::new();
        draft.add_item(product, qty).unwrap();

        let tier = ResolvedTier::fallback();
        let quote = calculate_price(
            &PriceRequest {
                subtotal: draft.subtotal(),
                base_cashback: draft.base_cashback(),
                coupon,
                tier: &tier,
                bonuses: &[],
                applicable_bonuses: &[],
                points_balance,
                redemption,
            },
            &PricingPolicy::default(),
        )
        .unwrap();

        NewOrder::new(
            customer,
            draft.lines,
            quote,
            referral_code.map(str::to_string),
            today(),
        )
    }

    async fn coupon(db: &Database, max_uses: Option<i64>) -> CouponDiscount {
        db.coupons()
            .insert(NewCoupon {
                code: "SAVE20".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: 2000,
                min_order_amount_cents: 0,
                max_uses,
                valid_from: None,
                valid_until: None,
            })
            .await
            .unwrap();

        db.coupons()
            .validate("SAVE20", Money::from_cents(10_000), Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_place_reserves_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;

        let placed = db
            .orders()
            .place(new_order("cust-1", &product, 2, None, 0, PointsRedemption::None, None))
            .await
            .unwrap();

        assert_eq!(placed.order.status, OrderStatus::PendingPayment);
        assert_eq!(placed.order.total_cents, 20_000);
        assert_eq!(placed.items.len(), 1);
        assert_eq!(placed.items[0].line_total_cents, 20_000);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 3);

        let fetched = db.orders().get_with_items(&placed.order.id).await.unwrap().unwrap();
        assert_eq!(fetched.items[0].sku_snapshot, "OUD-50");
        assert_eq!(db.orders().list_for_customer("cust-1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_place_rolls_back_on_insufficient_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;

        let mut order = new_order("cust-1", &product, 2, None, 0, PointsRedemption::None, None);
        // Stock dropped after the draft was priced.
        order.lines[0].quantity = 6;

        let err = db.orders().place(order).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
        assert!(db.orders().list_for_customer("cust-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_lifecycle_credits_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;
        let discount = coupon(&db, None).await;
        db.partners()
            .insert(NewPartner {
                name: "Scent Blog".to_string(),
                referral_code: "SCENTBLOG".to_string(),
                commission_bps: 1000,
            })
            .await
            .unwrap();

        let placed = db
            .orders()
            .place(new_order(
                "cust-1",
                &product,
                1,
                Some(&discount),
                0,
                PointsRedemption::None,
                Some("SCENTBLOG"),
            ))
            .await
            .unwrap();
        let id = placed.order.id.clone();
        assert_eq!(placed.order.total_cents, 8_000);

        let repo = db.orders();
        for status in [
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            repo.transition(&id, status, Utc::now()).await.unwrap();
        }

        let account = db.loyalty().get("cust-1").await.unwrap().unwrap();
        // 5% base cashback on 80.00, 10 points per unit spent.
        assert_eq!(account.cashback_balance_cents, 400);
        assert_eq!(account.points_balance, 800);
        assert_eq!(account.total_spent_cents, 8_000);

        let coupon = db.coupons().get_by_code("SAVE20").await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 1);

        let partner = db.partners().get_active_by_code("SCENTBLOG").await.unwrap().unwrap();
        assert_eq!(
            db.partners().commission_total(&partner.id).await.unwrap(),
            Money::from_cents(800)
        );

        // Delivered is terminal.
        let err = repo.transition(&id, OrderStatus::Cancelled, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidOrderTransition { .. })));
        let again = db.loyalty().get("cust-1").await.unwrap().unwrap();
        assert_eq!(again.points_balance, 800);

        let delivered = repo.get_by_id(&id).await.unwrap().unwrap();
        assert!(delivered.paid_at.is_some());
        assert!(delivered.delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_illegal_transitions_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;
        let placed = db
            .orders()
            .place(new_order("cust-1", &product, 1, None, 0, PointsRedemption::None, None))
            .await
            .unwrap();

        let err = db
            .orders()
            .transition(&placed.order.id, OrderStatus::Shipped, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidOrderTransition { .. })));

        let missing = db
            .orders()
            .transition("no-such-order", OrderStatus::Paid, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(missing, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_coupon_cap_enforced_at_payment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;
        let discount = coupon(&db, Some(1)).await;
        let repo = db.orders();

        // Both orders validated the coupon before either was paid.
        let first = repo
            .place(new_order("cust-1", &product, 1, Some(&discount), 0, PointsRedemption::None, None))
            .await
            .unwrap();
        let second = repo
            .place(new_order("cust-2", &product, 1, Some(&discount), 0, PointsRedemption::None, None))
            .await
            .unwrap();

        repo.transition(&first.order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap();
        let err = repo
            .transition(&second.order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Coupon(CouponError::UsageExceeded { max_uses: 1, .. }))
        ));

        let still_pending = repo.get_by_id(&second.order.id).await.unwrap().unwrap();
        assert_eq!(still_pending.status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_cancel_after_payment_refunds() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;
        let discount = coupon(&db, Some(5)).await;

        // 1000 points from an earlier delivered order.
        let earlier = db
            .orders()
            .place(new_order("cust-1", &product, 1, None, 0, PointsRedemption::None, None))
            .await
            .unwrap();
        for status in [
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            db.orders()
                .transition(&earlier.order.id, status, Utc::now())
                .await
                .unwrap();
        }
        let balance = db.loyalty().get("cust-1").await.unwrap().unwrap().points_balance;
        assert_eq!(balance, 1_000);

        let placed = db
            .orders()
            .place(new_order(
                "cust-1",
                &product,
                1,
                Some(&discount),
                balance,
                PointsRedemption::Max,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(placed.order.points_redeemed, 1_000);
        assert_eq!(placed.order.total_cents, 7_000);

        db.orders()
            .transition(&placed.order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            db.loyalty().get("cust-1").await.unwrap().unwrap().points_balance,
            0
        );

        let cancelled = db
            .orders()
            .transition(&placed.order.id, OrderStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        assert!(cancelled.cancelled_at.is_some());

        let account = db.loyalty().get("cust-1").await.unwrap().unwrap();
        assert_eq!(account.points_balance, 1_000);
        assert_eq!(
            db.coupons().get_by_code("SAVE20").await.unwrap().unwrap().current_uses,
            0
        );
        // The delivered order keeps its unit.
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 4);

        let ledger = db.loyalty().ledger("cust-1", 10).await.unwrap();
        assert_eq!(ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_units_sold_counts_paid_orders_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let oud = stocked(&db, "OUD-50", 10_000, 10).await;
        let rose = stocked(&db, "ROSE-30", 6_500, 10).await;

        let paid = db
            .orders()
            .place(new_order("cust-1", &oud, 3, None, 0, PointsRedemption::None, None))
            .await
            .unwrap();
        db.orders()
            .transition(&paid.order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap();
        db.orders()
            .place(new_order("cust-1", &rose, 2, None, 0, PointsRedemption::None, None))
            .await
            .unwrap();

        let sales = db
            .orders()
            .units_sold_since(Utc::now() - chrono::Duration::days(30))
            .await
            .unwrap();

        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].sku, "OUD-50");
        assert_eq!(sales[0].units_sold, 3);
        assert_eq!(sales[0].stock, 7);
        assert_eq!(sales[1].units_sold, 0);
    }

    fn birthday() -> NaiveDate {
        NaiveDate::from_ymd_opt(1990, 5, 1).unwrap()
    }

    /// Prices one unit with the customer's situational bonuses for today.
    async fn bonus_order(db: &Database, customer: &str, product: &Product) -> NewOrder {
        let account = db.loyalty().get_or_create(customer, today()).await.unwrap();
        let bonuses = db.loyalty_program().active_bonuses().await.unwrap();
        let applicable = account.applicable_bonuses(today(), false);

        let mut draft = OrderDraft::new();
        draft.add_item(product, 1).unwrap();

        let tier = ResolvedTier::fallback();
        let quote = calculate_price(
            &PriceRequest {
                subtotal: draft.subtotal(),
                base_cashback: draft.base_cashback(),
                coupon: None,
                tier: &tier,
                bonuses: &bonuses,
                applicable_bonuses: &applicable,
                points_balance: account.points_balance,
                redemption: PointsRedemption::None,
            },
            &PricingPolicy::default(),
        )
        .unwrap();

        NewOrder::new(customer, draft.lines, quote, None, today())
    }

    #[tokio::test]
    async fn test_birthday_bonus_claimed_once_per_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;
        db.loyalty()
            .update_preferences("cust-1", Some(birthday()), None, today())
            .await
            .unwrap();

        // Both carts were priced before either order was placed.
        let first = bonus_order(&db, "cust-1", &product).await;
        let second = bonus_order(&db, "cust-1", &product).await;
        assert_eq!(first.claims, vec![AnnualClaim::Birthday]);
        // 5% base + 5% birthday
        assert_eq!(first.quote.cashback.total, Percent::from_bps(1_000));

        db.orders().place(first).await.unwrap();
        let account = db.loyalty().get("cust-1").await.unwrap().unwrap();
        assert_eq!(account.last_birthday_claim_year, Some(2024));

        let err = db.orders().place(second).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::AlreadyClaimed { year: 2024, .. })
        ));
        assert_eq!(db.orders().list_for_customer("cust-1", 10).await.unwrap().len(), 1);
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 4);

        // Later the same day the bonus is no longer offered.
        let third = bonus_order(&db, "cust-1", &product).await;
        assert!(third.claims.is_empty());
        assert_eq!(third.quote.cashback.total, Percent::from_bps(500));
    }

    #[tokio::test]
    async fn test_cancel_gives_back_birthday_claim() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = stocked(&db, "OUD-50", 10_000, 5).await;
        db.loyalty()
            .update_preferences("cust-1", Some(birthday()), None, today())
            .await
            .unwrap();

        // Cancelled before payment.
        let unpaid = db
            .orders()
            .place(bonus_order(&db, "cust-1", &product).await)
            .await
            .unwrap();
        db.orders()
            .transition(&unpaid.order.id, OrderStatus::Cancelled, Utc::now())
            .await
            .unwrap();

        let account = db.loyalty().get("cust-1").await.unwrap().unwrap();
        assert_eq!(account.last_birthday_claim_year, None);
        assert!(account
            .applicable_bonuses(today(), false)
            .contains(&BonusType::Birthday));

        // Cancelled after payment.
        let retry = bonus_order(&db, "cust-1", &product).await;
        assert_eq!(retry.claims, vec![AnnualClaim::Birthday]);
        let paid = db.orders().place(retry).await.unwrap();
        db.orders()
            .transition(&paid.order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap();
        db.orders()
            .transition(&paid.order.id, OrderStatus::Cancelled, Utc::now())
            .await
            .unwrap();

        let account = db.loyalty().get("cust-1").await.unwrap().unwrap();
        assert_eq!(account.last_birthday_claim_year, None);

        // A delivered birthday order keeps its claim.
        let kept = db
            .orders()
            .place(bonus_order(&db, "cust-1", &product).await)
            .await
            .unwrap();
        for status in [
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            db.orders().transition(&kept.order.id, status, Utc::now()).await.unwrap();
        }

        let account = db.loyalty().get("cust-1").await.unwrap().unwrap();
        assert_eq!(account.last_birthday_claim_year, Some(2024));
        // 10% of 100.00
        assert_eq!(account.cashback_balance_cents, 1_000);
        assert!(bonus_order(&db, "cust-1", &product).await.claims.is_empty());
    }
}
