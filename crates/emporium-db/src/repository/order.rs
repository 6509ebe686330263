//! # Order Repository
//!
//! Database operations for orders and their frozen line items.
//!
//! ## Placement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      place(order)                                       │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   │                                                                     │
//! │   ├── for each product in the order (quantities summed):                │
//! │   │     UPDATE products SET stock = stock - qty                         │
//! │   │      WHERE id = ? AND is_active = 1 AND stock >= qty                │
//! │   │     0 rows? ──► ROLLBACK, DbError::StockConflict                    │
//! │   │                                                                     │
//! │   ├── INSERT INTO orders (...)                                          │
//! │   ├── INSERT INTO order_items (...)  × n                                │
//! │   │                                                                     │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Either every decrement and the order land together, or nothing does.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Updates
//! Writes are guarded by the status the caller planned from
//! (`WHERE order_status = ?`), so two concurrent admin updates can't both
//! apply to the same starting state.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use emporium_core::order::StatusChange;
use emporium_core::{
    Order, OrderItem, OrderStatus, PageRequest, Paginated, PaymentMethod, PaymentResult,
    ShippingAddress,
};

const ORDER_COLUMNS: &str = "id, user_id, shipping_address, payment_method, subtotal_cents, \
     shipping_cents, tax_cents, total_cents, order_status, payment_result, tracking_number, \
     delivered_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    shipping_address: Json<ShippingAddress>,
    payment_method: PaymentMethod,
    subtotal_cents: i64,
    shipping_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    order_status: OrderStatus,
    payment_result: Option<Json<PaymentResult>>,
    tracking_number: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method,
            subtotal_cents: self.subtotal_cents,
            shipping_cents: self.shipping_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            order_status: self.order_status,
            payment_result: self.payment_result.map(|json| json.0),
            tracking_number: self.tracking_number,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    name: String,
    price_cents: i64,
    quantity: i64,
    image: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name: row.name,
            price_cents: row.price_cents,
            quantity: row.quantity,
            image: row.image,
        }
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Persists a priced order and reserves its stock atomically.
    ///
    /// ## Returns
    /// * `Ok(())` - Order stored, stock decremented
    /// * `Err(DbError::StockConflict)` - A product ran out or was deactivated;
    ///   nothing was written
    pub async fn place(&self, order: &Order) -> DbResult<()> {
        debug!(
            order_id = %order.id,
            user_id = %order.user_id,
            lines = order.items.len(),
            "Placing order"
        );

        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in reservations(&order.items) {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - ?2, updated_at = ?3
                WHERE id = ?1 AND is_active = 1 AND stock >= ?2
                "#,
            )
            .bind(product_id)
            .bind(quantity)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(
                    order_id = %order.id,
                    product_id = %product_id,
                    requested = quantity,
                    "Stock reservation failed, rolling back order"
                );
                tx.rollback().await?;
                return Err(DbError::StockConflict {
                    product_id: product_id.to_string(),
                    requested: quantity,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, shipping_address, payment_method,
                subtotal_cents, shipping_cents, tax_cents, total_cents,
                order_status, payment_result, tracking_number, delivered_at,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method)
        .bind(order.subtotal_cents)
        .bind(order.shipping_cents)
        .bind(order.tax_cents)
        .bind(order.total_cents)
        .bind(order.order_status)
        .bind(order.payment_result.as_ref().map(Json))
        .bind(&order.tracking_number)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, position, product_id, name, price_cents, quantity, image
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.price_cents)
            .bind(item.quantity)
            .bind(&item.image)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            total_cents = order.total_cents,
            "Order placed"
        );
        Ok(())
    }

    /// Gets an order with its items.
    pub async fn get(&self, id: &str) -> DbResult<Order> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let row = row.ok_or_else(|| DbError::not_found("Order", id))?;
        let mut orders = self.attach_items(vec![row]).await?;
        orders.pop().ok_or_else(|| DbError::not_found("Order", id))
    }

    /// A customer's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// Admin listing, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<OrderStatus>, page: PageRequest) -> DbResult<Paginated<Order>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders");
        if let Some(status) = status {
            count.push(" WHERE order_status = ").push_bind(status);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        if let Some(status) = status {
            select.push(" WHERE order_status = ").push_bind(status);
        }
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let orders = self.attach_items(rows).await?;

        Ok(Paginated::new(orders, total, page))
    }

    /// Writes a planned status change.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No such order
    /// * `Err(DbError::StaleState)` - The order left `change.from` since it was read
    pub async fn update_status(&self, id: &str, change: &StatusChange) -> DbResult<Order> {
        debug!(order_id = %id, from = %change.from, to = %change.to, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                order_status = ?2,
                tracking_number = COALESCE(?3, tracking_number),
                delivered_at = COALESCE(?4, delivered_at),
                updated_at = ?5
            WHERE id = ?1 AND order_status = ?6
            "#,
        )
        .bind(id)
        .bind(change.to)
        .bind(&change.tracking_number)
        .bind(change.delivered_at)
        .bind(Utc::now())
        .bind(change.from)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_stale(id).await?);
        }

        self.get(id).await
    }

    /// Replaces the payment record without touching the status.
    pub async fn update_payment_result(&self, id: &str, payment: &PaymentResult) -> DbResult<Order> {
        let result = sqlx::query("UPDATE orders SET payment_result = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(Json(payment))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        self.get(id).await
    }

    /// Records a settled gateway payment and moves a pending order to confirmed.
    ///
    /// Orders past pending keep their status, so repeated deliveries of the
    /// same payment are harmless.
    pub async fn confirm_payment(&self, id: &str, payment: &PaymentResult) -> DbResult<Order> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                payment_result = ?2,
                order_status = CASE WHEN order_status = ?3 THEN ?4 ELSE order_status END,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Json(payment))
        .bind(OrderStatus::Pending)
        .bind(OrderStatus::Confirmed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        info!(order_id = %id, "Payment confirmed");
        self.get(id).await
    }

    async fn missing_or_stale(&self, id: &str) -> DbResult<DbError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match exists {
            Some(_) => DbError::stale("Order", id),
            None => DbError::not_found("Order", id),
        })
    }

    /// Loads the items of `rows` in one query and assembles orders in row order.
    async fn attach_items(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT order_id, product_id, name, price_cents, quantity, image \
             FROM order_items WHERE order_id IN (",
        );
        let mut separated = query.separated(", ");
        for row in &rows {
            separated.push_bind(row.id.clone());
        }
        separated.push_unseparated(") ORDER BY order_id, position");

        let item_rows: Vec<OrderItemRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            by_order
                .entry(item.order_id.clone())
                .or_default()
                .push(item.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

/// Quantity per product, summed over repeated lines, in id order.
fn reservations(items: &[OrderItem]) -> BTreeMap<&str, i64> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.product_id.as_str()).or_insert(0) += item.quantity;
    }
    totals
}

// =============================================================================
// Unit Tests
// =============================================================================
