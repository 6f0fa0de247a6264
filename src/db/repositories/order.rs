//! Order repository
//!
//! Database operations for orders, order items, payments and the status
//! history audit trail. Payment recording runs in a transaction so the paid
//! transition and the payment row commit together, and the guarded UPDATE
//! makes the transition happen at most once per order.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    ItemType, Order, OrderItem, OrderPriority, OrderStatus, OrderStatusHistory, Payment,
    PaymentRecordStatus, PaymentStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Input for creating an order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub order_number: String,
    pub total_amount: i64,
    pub gateway_order_id: Option<String>,
}

/// Input for one snapshotted order line
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub item_type: ItemType,
    pub item_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

/// Input for recording a verified payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub method: String,
    pub transaction_id: String,
    pub amount: i64,
    pub currency: String,
    pub invoice_number: String,
}

/// Admin order list filter on assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignedFilter {
    /// Orders with no assignee
    Unassigned,
    /// Orders assigned to a specific user
    User(i64),
}

/// Filters for the admin order list
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub assigned_to: Option<AssignedFilter>,
    /// Substring match on order number, username or phone number
    pub search: Option<String>,
}

/// Targeted update of admin-editable order fields
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    /// `Some(None)` clears the assignment
    pub assigned_to: Option<Option<i64>>,
    pub priority: Option<OrderPriority>,
    pub admin_notes: Option<String>,
}

/// Revenue aggregates over paid orders
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RevenueStats {
    /// Sum of paid order totals, in paise
    pub total_revenue: i64,
    /// Number of paid orders
    pub order_count: i64,
    /// total_revenue / order_count, in paise (0 when no orders)
    pub average_order_value: i64,
}

/// Sales aggregate for one catalog item
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProductSales {
    pub item_type: ItemType,
    pub item_id: i64,
    pub name: String,
    pub quantity_sold: i64,
    /// Revenue in paise
    pub revenue: i64,
}

/// Order repository trait
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Create an order and its snapshotted items in one transaction
    async fn create(&self, order: &NewOrder, items: &[NewOrderItem]) -> Result<Order>;

    /// Get an order by id
    async fn get_by_id(&self, id: i64) -> Result<Option<Order>>;

    /// List a user's orders, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>>;

    /// List snapshotted items for an order
    async fn list_items(&self, order_id: i64) -> Result<Vec<OrderItem>>;

    /// List orders for the admin panel, newest first
    async fn list_filtered(&self, filter: &OrderFilter) -> Result<Vec<Order>>;

    /// Record a verified payment. Sets payment_status = paid,
    /// status = pending_resources, stores gateway ids and the payment row,
    /// and appends a status history entry, all in one transaction.
    ///
    /// Returns `false` without touching anything if the order is already
    /// paid, which makes duplicate verification callbacks idempotent.
    async fn mark_paid(
        &self,
        order_id: i64,
        gateway_payment_id: &str,
        gateway_signature: &str,
        payment: &NewPayment,
    ) -> Result<bool>;

    /// Get the payment recorded for an order
    async fn get_payment(&self, order_id: i64) -> Result<Option<Payment>>;

    /// Apply admin-editable field updates
    async fn update_fields(&self, id: i64, update: &OrderUpdate) -> Result<Option<Order>>;

    /// Append a status history entry
    async fn add_status_history(
        &self,
        order_id: i64,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Option<i64>,
        reason: &str,
    ) -> Result<()>;

    /// List status history for an order, oldest first
    async fn list_status_history(&self, order_id: i64) -> Result<Vec<OrderStatusHistory>>;

    /// Revenue aggregates over paid orders in the optional date range
    async fn revenue_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<RevenueStats>;

    /// Best-selling items by quantity over paid orders
    async fn top_products(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<ProductSales>>;

    /// Order counts grouped by status
    async fn status_counts(&self) -> Result<Vec<(OrderStatus, i64)>>;
}

/// SQLx-based order repository supporting SQLite and MySQL
pub struct SqlxOrderRepository {
    pool: DynDatabasePool,
}

impl SqlxOrderRepository {
    /// Create a new SQLx order repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn OrderRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn create(&self, order: &NewOrder, items: &[NewOrderItem]) -> Result<Order> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_order_sqlite(self.pool.as_sqlite().unwrap(), order, items).await
            }
            DatabaseDriver::Mysql => {
                create_order_mysql(self.pool.as_mysql().unwrap(), order, items).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_order_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_order_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_user_orders_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_user_orders_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn list_items(&self, order_id: i64) -> Result<Vec<OrderItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_order_items_sqlite(self.pool.as_sqlite().unwrap(), order_id).await
            }
            DatabaseDriver::Mysql => {
                list_order_items_mysql(self.pool.as_mysql().unwrap(), order_id).await
            }
        }
    }

    async fn list_filtered(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_filtered_sqlite(self.pool.as_sqlite().unwrap(), filter).await
            }
            DatabaseDriver::Mysql => {
                list_filtered_mysql(self.pool.as_mysql().unwrap(), filter).await
            }
        }
    }

    async fn mark_paid(
        &self,
        order_id: i64,
        gateway_payment_id: &str,
        gateway_signature: &str,
        payment: &NewPayment,
    ) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                mark_paid_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    order_id,
                    gateway_payment_id,
                    gateway_signature,
                    payment,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                mark_paid_mysql(
                    self.pool.as_mysql().unwrap(),
                    order_id,
                    gateway_payment_id,
                    gateway_signature,
                    payment,
                )
                .await
            }
        }
    }

    async fn get_payment(&self, order_id: i64) -> Result<Option<Payment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_payment_sqlite(self.pool.as_sqlite().unwrap(), order_id).await
            }
            DatabaseDriver::Mysql => {
                get_payment_mysql(self.pool.as_mysql().unwrap(), order_id).await
            }
        }
    }

    async fn update_fields(&self, id: i64, update: &OrderUpdate) -> Result<Option<Order>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_fields_sqlite(self.pool.as_sqlite().unwrap(), id, update).await
            }
            DatabaseDriver::Mysql => {
                update_fields_mysql(self.pool.as_mysql().unwrap(), id, update).await
            }
        }
    }

    async fn add_status_history(
        &self,
        order_id: i64,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Option<i64>,
        reason: &str,
    ) -> Result<()> {
        let sql = "INSERT INTO order_status_history \
                   (order_id, old_status, new_status, changed_by, reason, changed_at) \
                   VALUES (?, ?, ?, ?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(order_id)
                    .bind(old_status.to_string())
                    .bind(new_status.to_string())
                    .bind(changed_by)
                    .bind(reason)
                    .bind(Utc::now())
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to add status history")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(order_id)
                    .bind(old_status.to_string())
                    .bind(new_status.to_string())
                    .bind(changed_by)
                    .bind(reason)
                    .bind(Utc::now())
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to add status history")?;
            }
        }
        Ok(())
    }

    async fn list_status_history(&self, order_id: i64) -> Result<Vec<OrderStatusHistory>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_history_sqlite(self.pool.as_sqlite().unwrap(), order_id).await
            }
            DatabaseDriver::Mysql => {
                list_history_mysql(self.pool.as_mysql().unwrap(), order_id).await
            }
        }
    }

    async fn revenue_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<RevenueStats> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                revenue_stats_sqlite(self.pool.as_sqlite().unwrap(), start, end).await
            }
            DatabaseDriver::Mysql => {
                revenue_stats_mysql(self.pool.as_mysql().unwrap(), start, end).await
            }
        }
    }

    async fn top_products(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<ProductSales>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                top_products_sqlite(self.pool.as_sqlite().unwrap(), start, end, limit).await
            }
            DatabaseDriver::Mysql => {
                top_products_mysql(self.pool.as_mysql().unwrap(), start, end, limit).await
            }
        }
    }

    async fn status_counts(&self) -> Result<Vec<(OrderStatus, i64)>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => status_counts_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => status_counts_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, order_number, total_amount, status, payment_status, \
    gateway_order_id, gateway_payment_id, gateway_signature, payment_completed_at, \
    assigned_to, priority, admin_notes, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, order_id, method, transaction_id, amount, currency, status, invoice_number, paid_at, created_at";

fn filtered_sql(filter: &OrderFilter) -> String {
    let mut sql = format!(
        "SELECT o.{} FROM orders o JOIN users u ON o.user_id = u.id WHERE 1=1",
        ORDER_COLUMNS.replace(", ", ", o.")
    );
    if filter.status.is_some() {
        sql.push_str(" AND o.status = ?");
    }
    match filter.assigned_to {
        Some(AssignedFilter::Unassigned) => sql.push_str(" AND o.assigned_to IS NULL"),
        Some(AssignedFilter::User(_)) => sql.push_str(" AND o.assigned_to = ?"),
        None => {}
    }
    if filter.search.is_some() {
        sql.push_str(
            " AND (o.order_number LIKE ? OR u.username LIKE ? OR u.phone_number LIKE ?)",
        );
    }
    sql.push_str(" ORDER BY o.created_at DESC, o.id DESC");
    sql
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_order_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Order> {
    let status_str: String = row.get("status");
    let payment_status_str: String = row.get("payment_status");
    let priority_str: String = row.get("priority");

    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        order_number: row.get("order_number"),
        total_amount: row.get("total_amount"),
        status: OrderStatus::from_str(&status_str)
            .with_context(|| format!("Invalid order status in database: {}", status_str))?,
        payment_status: PaymentStatus::from_str(&payment_status_str)
            .with_context(|| format!("Invalid payment status in database: {}", payment_status_str))?,
        gateway_order_id: row.get("gateway_order_id"),
        gateway_payment_id: row.get("gateway_payment_id"),
        gateway_signature: row.get("gateway_signature"),
        payment_completed_at: row.get("payment_completed_at"),
        assigned_to: row.get("assigned_to"),
        priority: OrderPriority::from_str(&priority_str)
            .with_context(|| format!("Invalid priority in database: {}", priority_str))?,
        admin_notes: row.get("admin_notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_order_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<OrderItem> {
    let item_type_str: String = row.get("item_type");
    Ok(OrderItem {
        id: row.get("id"),
        order_id: row.get("order_id"),
        item_type: ItemType::from_str(&item_type_str)?,
        item_id: row.get("item_id"),
        name: row.get("name"),
        price: row.get("price"),
        quantity: row.get("quantity"),
    })
}

fn row_to_payment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Payment> {
    let status_str: String = row.get("status");
    Ok(Payment {
        id: row.get("id"),
        order_id: row.get("order_id"),
        method: row.get("method"),
        transaction_id: row.get("transaction_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        status: PaymentRecordStatus::from_str(&status_str)?,
        invoice_number: row.get("invoice_number"),
        paid_at: row.get("paid_at"),
        created_at: row.get("created_at"),
    })
}

fn row_to_history_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<OrderStatusHistory> {
    let old_str: String = row.get("old_status");
    let new_str: String = row.get("new_status");
    Ok(OrderStatusHistory {
        id: row.get("id"),
        order_id: row.get("order_id"),
        old_status: OrderStatus::from_str(&old_str)?,
        new_status: OrderStatus::from_str(&new_str)?,
        changed_by: row.get("changed_by"),
        reason: row.get("reason"),
        changed_at: row.get("changed_at"),
    })
}

async fn create_order_sqlite(
    pool: &SqlitePool,
    order: &NewOrder,
    items: &[NewOrderItem],
) -> Result<Order> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO orders
            (user_id, order_number, total_amount, status, payment_status,
             gateway_order_id, priority, admin_notes, created_at, updated_at)
        VALUES (?, ?, ?, 'pending_payment', 'unpaid', ?, 'normal', '', ?, ?)
        "#,
    )
    .bind(order.user_id)
    .bind(&order.order_number)
    .bind(order.total_amount)
    .bind(&order.gateway_order_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?;

    let order_id = result.last_insert_rowid();

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, item_type, item_id, name, price, quantity)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(item.item_type.to_string())
        .bind(item.item_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await
        .context("Failed to create order item")?;
    }

    tx.commit().await.context("Failed to commit order")?;

    get_order_sqlite(pool, order_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Order not found after insert"))
}

async fn get_order_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Order>> {
    let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?;

    match row {
        Some(row) => Ok(Some(row_to_order_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_user_orders_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Order>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list user orders")?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(row_to_order_sqlite(&row)?);
    }
    Ok(orders)
}

async fn list_order_items_sqlite(pool: &SqlitePool, order_id: i64) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query(
        "SELECT id, order_id, item_type, item_id, name, price, quantity \
         FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .context("Failed to list order items")?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row_to_order_item_sqlite(&row)?);
    }
    Ok(items)
}

async fn list_filtered_sqlite(pool: &SqlitePool, filter: &OrderFilter) -> Result<Vec<Order>> {
    let sql = filtered_sql(filter);
    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.to_string());
    }
    if let Some(AssignedFilter::User(id)) = filter.assigned_to {
        query = query.bind(id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list filtered orders")?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(row_to_order_sqlite(&row)?);
    }
    Ok(orders)
}

async fn mark_paid_sqlite(
    pool: &SqlitePool,
    order_id: i64,
    gateway_payment_id: &str,
    gateway_signature: &str,
    payment: &NewPayment,
) -> Result<bool> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Guarded update: only an unpaid order transitions. Duplicate callbacks
    // see rows_affected == 0 and bail out before writing anything.
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = 'paid', status = 'pending_resources',
            gateway_payment_id = ?, gateway_signature = ?,
            payment_completed_at = ?, updated_at = ?
        WHERE id = ? AND payment_status = 'unpaid'
        "#,
    )
    .bind(gateway_payment_id)
    .bind(gateway_signature)
    .bind(now)
    .bind(now)
    .bind(order_id)
    .execute(&mut *tx)
    .await
    .context("Failed to mark order paid")?;

    if result.rows_affected() == 0 {
        tx.rollback().await.ok();
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO payments
            (order_id, method, transaction_id, amount, currency, status,
             invoice_number, paid_at, created_at)
        VALUES (?, ?, ?, ?, ?, 'completed', ?, ?, ?)
        "#,
    )
    .bind(order_id)
    .bind(&payment.method)
    .bind(&payment.transaction_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.invoice_number)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record payment")?;

    sqlx::query(
        r#"
        INSERT INTO order_status_history
            (order_id, old_status, new_status, changed_by, reason, changed_at)
        VALUES (?, 'pending_payment', 'pending_resources', NULL, 'Payment verified', ?)
        "#,
    )
    .bind(order_id)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record status history")?;

    tx.commit().await.context("Failed to commit payment")?;
    Ok(true)
}

async fn get_payment_sqlite(pool: &SqlitePool, order_id: i64) -> Result<Option<Payment>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM payments WHERE order_id = ?",
        PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get payment")?;

    match row {
        Some(row) => Ok(Some(row_to_payment_sqlite(&row)?)),
        None => Ok(None),
    }
}

fn update_sql(update: &OrderUpdate) -> String {
    let mut sql = "UPDATE orders SET updated_at = ?".to_string();
    if update.status.is_some() {
        sql.push_str(", status = ?");
    }
    if update.assigned_to.is_some() {
        sql.push_str(", assigned_to = ?");
    }
    if update.priority.is_some() {
        sql.push_str(", priority = ?");
    }
    if update.admin_notes.is_some() {
        sql.push_str(", admin_notes = ?");
    }
    sql.push_str(" WHERE id = ?");
    sql
}

async fn update_fields_sqlite(
    pool: &SqlitePool,
    id: i64,
    update: &OrderUpdate,
) -> Result<Option<Order>> {
    let sql = update_sql(update);
    let mut query = sqlx::query(&sql).bind(Utc::now());
    if let Some(status) = update.status {
        query = query.bind(status.to_string());
    }
    if let Some(assigned) = update.assigned_to {
        query = query.bind(assigned);
    }
    if let Some(priority) = update.priority {
        query = query.bind(priority.to_string());
    }
    if let Some(notes) = &update.admin_notes {
        query = query.bind(notes);
    }
    let result = query
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update order")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_order_sqlite(pool, id).await
}

async fn list_history_sqlite(pool: &SqlitePool, order_id: i64) -> Result<Vec<OrderStatusHistory>> {
    let rows = sqlx::query(
        "SELECT id, order_id, old_status, new_status, changed_by, reason, changed_at \
         FROM order_status_history WHERE order_id = ? ORDER BY changed_at, id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .context("Failed to list status history")?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row_to_history_sqlite(&row)?);
    }
    Ok(entries)
}

fn revenue_sql(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> String {
    let mut sql = "SELECT COALESCE(SUM(total_amount), 0) as total, COUNT(*) as cnt \
                   FROM orders WHERE payment_status = 'paid'"
        .to_string();
    if start.is_some() {
        sql.push_str(" AND payment_completed_at >= ?");
    }
    if end.is_some() {
        sql.push_str(" AND payment_completed_at <= ?");
    }
    sql
}

async fn revenue_stats_sqlite(
    pool: &SqlitePool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<RevenueStats> {
    let sql = revenue_sql(start, end);
    let mut query = sqlx::query(&sql);
    if let Some(start) = start {
        query = query.bind(start);
    }
    if let Some(end) = end {
        query = query.bind(end);
    }

    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to compute revenue stats")?;

    let total_revenue: i64 = row.get("total");
    let order_count: i64 = row.get("cnt");
    Ok(RevenueStats {
        total_revenue,
        order_count,
        average_order_value: if order_count > 0 {
            total_revenue / order_count
        } else {
            0
        },
    })
}

fn top_products_sql(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> String {
    let mut sql = "SELECT oi.item_type, oi.item_id, oi.name, \
                   SUM(oi.quantity) as quantity_sold, \
                   SUM(oi.price * oi.quantity) as revenue \
                   FROM order_items oi \
                   JOIN orders o ON oi.order_id = o.id \
                   WHERE o.payment_status = 'paid'"
        .to_string();
    if start.is_some() {
        sql.push_str(" AND o.payment_completed_at >= ?");
    }
    if end.is_some() {
        sql.push_str(" AND o.payment_completed_at <= ?");
    }
    sql.push_str(
        " GROUP BY oi.item_type, oi.item_id, oi.name \
         ORDER BY quantity_sold DESC, revenue DESC LIMIT ?",
    );
    sql
}

async fn top_products_sqlite(
    pool: &SqlitePool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<ProductSales>> {
    let sql = top_products_sql(start, end);
    let mut query = sqlx::query(&sql);
    if let Some(start) = start {
        query = query.bind(start);
    }
    if let Some(end) = end {
        query = query.bind(end);
    }
    let rows = query
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to compute top products")?;

    let mut sales = Vec::new();
    for row in rows {
        let item_type_str: String = row.get("item_type");
        sales.push(ProductSales {
            item_type: ItemType::from_str(&item_type_str)?,
            item_id: row.get("item_id"),
            name: row.get("name"),
            quantity_sold: row.get("quantity_sold"),
            revenue: row.get("revenue"),
        });
    }
    Ok(sales)
}

async fn status_counts_sqlite(pool: &SqlitePool) -> Result<Vec<(OrderStatus, i64)>> {
    let rows = sqlx::query("SELECT status, COUNT(*) as cnt FROM orders GROUP BY status")
        .fetch_all(pool)
        .await
        .context("Failed to compute status counts")?;

    let mut counts = Vec::new();
    for row in rows {
        let status_str: String = row.get("status");
        counts.push((OrderStatus::from_str(&status_str)?, row.get("cnt")));
    }
    Ok(counts)
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_order_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Order> {
    let status_str: String = row.get("status");
    let payment_status_str: String = row.get("payment_status");
    let priority_str: String = row.get("priority");

    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        order_number: row.get("order_number"),
        total_amount: row.get("total_amount"),
        status: OrderStatus::from_str(&status_str)
            .with_context(|| format!("Invalid order status in database: {}", status_str))?,
        payment_status: PaymentStatus::from_str(&payment_status_str)
            .with_context(|| format!("Invalid payment status in database: {}", payment_status_str))?,
        gateway_order_id: row.get("gateway_order_id"),
        gateway_payment_id: row.get("gateway_payment_id"),
        gateway_signature: row.get("gateway_signature"),
        payment_completed_at: row.get("payment_completed_at"),
        assigned_to: row.get("assigned_to"),
        priority: OrderPriority::from_str(&priority_str)
            .with_context(|| format!("Invalid priority in database: {}", priority_str))?,
        admin_notes: row.get("admin_notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_order_item_mysql(row: &sqlx::mysql::MySqlRow) -> Result<OrderItem> {
    let item_type_str: String = row.get("item_type");
    Ok(OrderItem {
        id: row.get("id"),
        order_id: row.get("order_id"),
        item_type: ItemType::from_str(&item_type_str)?,
        item_id: row.get("item_id"),
        name: row.get("name"),
        price: row.get("price"),
        quantity: row.get("quantity"),
    })
}

fn row_to_payment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Payment> {
    let status_str: String = row.get("status");
    Ok(Payment {
        id: row.get("id"),
        order_id: row.get("order_id"),
        method: row.get("method"),
        transaction_id: row.get("transaction_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        status: PaymentRecordStatus::from_str(&status_str)?,
        invoice_number: row.get("invoice_number"),
        paid_at: row.get("paid_at"),
        created_at: row.get("created_at"),
    })
}

fn row_to_history_mysql(row: &sqlx::mysql::MySqlRow) -> Result<OrderStatusHistory> {
    let old_str: String = row.get("old_status");
    let new_str: String = row.get("new_status");
    Ok(OrderStatusHistory {
        id: row.get("id"),
        order_id: row.get("order_id"),
        old_status: OrderStatus::from_str(&old_str)?,
        new_status: OrderStatus::from_str(&new_str)?,
        changed_by: row.get("changed_by"),
        reason: row.get("reason"),
        changed_at: row.get("changed_at"),
    })
}

async fn create_order_mysql(
    pool: &MySqlPool,
    order: &NewOrder,
    items: &[NewOrderItem],
) -> Result<Order> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO orders
            (user_id, order_number, total_amount, status, payment_status,
             gateway_order_id, priority, admin_notes, created_at, updated_at)
        VALUES (?, ?, ?, 'pending_payment', 'unpaid', ?, 'normal', '', ?, ?)
        "#,
    )
    .bind(order.user_id)
    .bind(&order.order_number)
    .bind(order.total_amount)
    .bind(&order.gateway_order_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?;

    let order_id = result.last_insert_id() as i64;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, item_type, item_id, name, price, quantity)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(item.item_type.to_string())
        .bind(item.item_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await
        .context("Failed to create order item")?;
    }

    tx.commit().await.context("Failed to commit order")?;

    get_order_mysql(pool, order_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Order not found after insert"))
}

async fn get_order_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Order>> {
    let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?;

    match row {
        Some(row) => Ok(Some(row_to_order_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_user_orders_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Order>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list user orders")?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(row_to_order_mysql(&row)?);
    }
    Ok(orders)
}

async fn list_order_items_mysql(pool: &MySqlPool, order_id: i64) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query(
        "SELECT id, order_id, item_type, item_id, name, price, quantity \
         FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .context("Failed to list order items")?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row_to_order_item_mysql(&row)?);
    }
    Ok(items)
}

async fn list_filtered_mysql(pool: &MySqlPool, filter: &OrderFilter) -> Result<Vec<Order>> {
    let sql = filtered_sql(filter);
    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.to_string());
    }
    if let Some(AssignedFilter::User(id)) = filter.assigned_to {
        query = query.bind(id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list filtered orders")?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(row_to_order_mysql(&row)?);
    }
    Ok(orders)
}

async fn mark_paid_mysql(
    pool: &MySqlPool,
    order_id: i64,
    gateway_payment_id: &str,
    gateway_signature: &str,
    payment: &NewPayment,
) -> Result<bool> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = 'paid', status = 'pending_resources',
            gateway_payment_id = ?, gateway_signature = ?,
            payment_completed_at = ?, updated_at = ?
        WHERE id = ? AND payment_status = 'unpaid'
        "#,
    )
    .bind(gateway_payment_id)
    .bind(gateway_signature)
    .bind(now)
    .bind(now)
    .bind(order_id)
    .execute(&mut *tx)
    .await
    .context("Failed to mark order paid")?;

    if result.rows_affected() == 0 {
        tx.rollback().await.ok();
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO payments
            (order_id, method, transaction_id, amount, currency, status,
             invoice_number, paid_at, created_at)
        VALUES (?, ?, ?, ?, ?, 'completed', ?, ?, ?)
        "#,
    )
    .bind(order_id)
    .bind(&payment.method)
    .bind(&payment.transaction_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.invoice_number)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record payment")?;

    sqlx::query(
        r#"
        INSERT INTO order_status_history
            (order_id, old_status, new_status, changed_by, reason, changed_at)
        VALUES (?, 'pending_payment', 'pending_resources', NULL, 'Payment verified', ?)
        "#,
    )
    .bind(order_id)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record status history")?;

    tx.commit().await.context("Failed to commit payment")?;
    Ok(true)
}

async fn get_payment_mysql(pool: &MySqlPool, order_id: i64) -> Result<Option<Payment>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM payments WHERE order_id = ?",
        PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get payment")?;

    match row {
        Some(row) => Ok(Some(row_to_payment_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn update_fields_mysql(
    pool: &MySqlPool,
    id: i64,
    update: &OrderUpdate,
) -> Result<Option<Order>> {
    let sql = update_sql(update);
    let mut query = sqlx::query(&sql).bind(Utc::now());
    if let Some(status) = update.status {
        query = query.bind(status.to_string());
    }
    if let Some(assigned) = update.assigned_to {
        query = query.bind(assigned);
    }
    if let Some(priority) = update.priority {
        query = query.bind(priority.to_string());
    }
    if let Some(notes) = &update.admin_notes {
        query = query.bind(notes);
    }
    let result = query
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update order")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_order_mysql(pool, id).await
}

async fn list_history_mysql(pool: &MySqlPool, order_id: i64) -> Result<Vec<OrderStatusHistory>> {
    let rows = sqlx::query(
        "SELECT id, order_id, old_status, new_status, changed_by, reason, changed_at \
         FROM order_status_history WHERE order_id = ? ORDER BY changed_at, id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .context("Failed to list status history")?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row_to_history_mysql(&row)?);
    }
    Ok(entries)
}

async fn revenue_stats_mysql(
    pool: &MySqlPool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<RevenueStats> {
    let sql = revenue_sql(start, end);
    let mut query = sqlx::query(&sql);
    if let Some(start) = start {
        query = query.bind(start);
    }
    if let Some(end) = end {
        query = query.bind(end);
    }

    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to compute revenue stats")?;

    let total_revenue: i64 = row.get("total");
    let order_count: i64 = row.get("cnt");
    Ok(RevenueStats {
        total_revenue,
        order_count,
        average_order_value: if order_count > 0 {
            total_revenue / order_count
        } else {
            0
        },
    })
}

async fn top_products_mysql(
    pool: &MySqlPool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<ProductSales>> {
    let sql = top_products_sql(start, end);
    let mut query = sqlx::query(&sql);
    if let Some(start) = start {
        query = query.bind(start);
    }
    if let Some(end) = end {
        query = query.bind(end);
    }
    let rows = query
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to compute top products")?;

    let mut sales = Vec::new();
    for row in rows {
        let item_type_str: String = row.get("item_type");
        sales.push(ProductSales {
            item_type: ItemType::from_str(&item_type_str)?,
            item_id: row.get("item_id"),
            name: row.get("name"),
            quantity_sold: row.get("quantity_sold"),
            revenue: row.get("revenue"),
        });
    }
    Ok(sales)
}

async fn status_counts_mysql(pool: &MySqlPool) -> Result<Vec<(OrderStatus, i64)>> {
    let rows = sqlx::query("SELECT status, COUNT(*) as cnt FROM orders GROUP BY status")
        .fetch_all(pool)
        .await
        .context("Failed to compute status counts")?;

    let mut counts = Vec::new();
    for row in rows {
        let status_str: String = row.get("status");
        counts.push((OrderStatus::from_str(&status_str)?, row.get("cnt")));
    }
    Ok(counts)
}
