//! # Order Repository
//!
//! Orders, their frozen line items, and the three multi-row commits of the
//! order lifecycle.
//!
//! ## Transactions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  place_order (one transaction)                                          │
//! │    1. read cart                        EmptyCart if no lines            │
//! │    2. per line: read book              BookNotFound                     │
//! │                 qty ≤ stock            InsufficientStock { available }  │
//! │                 conditional decrement  InsufficientStock (lost race)    │
//! │    3. price snapshot (OrderCosts)                                       │
//! │    4. insert order + order_items                                        │
//! │    5. clear cart                                                        │
//! │    Any error → rollback, nothing changed                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  change_status / cancel (one transaction)                               │
//! │    plan_status_change → write status → restock if reservation released │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  apply_payment (one transaction)                                        │
//! │    plan_payment → Complete: debit if no reservation, clear cart         │
//! │                 → Fail:     cancel, restock if reservation held         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{book, cart};
use bookstore_core::lifecycle::{
    plan_payment, plan_status_change, PaymentOutcome, PaymentTransition,
};
use bookstore_core::{
    CoreError, Money, Order, OrderCosts, OrderLineItem, OrderStatus, Page, PageRequest,
    PaymentMethod, PaymentStatus, PricingConfig, ShippingAddress,
};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    order_number: String,
    shipping_address: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    order_status: OrderStatus,
    subtotal: i64,
    tax: i64,
    shipping_cost: i64,
    total: i64,
    notes: Option<String>,
    payment_reference: Option<String>,
    stock_reserved: bool,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLineItem>) -> DbResult<Order> {
        let shipping_address: ShippingAddress = serde_json::from_str(&self.shipping_address)?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            order_number: self.order_number,
            items,
            shipping_address,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            order_status: self.order_status,
            costs: OrderCosts {
                subtotal: Money::from_minor(self.subtotal),
                tax: Money::from_minor(self.tax),
                shipping_cost: Money::from_minor(self.shipping_cost),
                total: Money::from_minor(self.total),
            },
            notes: self.notes,
            payment_reference: self.payment_reference,
            stock_reserved: self.stock_reserved,
            paid_at: self.paid_at,
            cancelled_at: self.cancelled_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    book_id: String,
    title: String,
    author: String,
    quantity: i64,
    unit_price: i64,
    subtotal: i64,
}

impl From<OrderItemRow> for OrderLineItem {
    fn from(row: OrderItemRow) -> Self {
        OrderLineItem {
            book_id: row.book_id,
            title: row.title,
            author: row.author,
            quantity: row.quantity,
            unit_price: Money::from_minor(row.unit_price),
            subtotal: Money::from_minor(row.subtotal),
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, order_number, shipping_address, payment_method, \
     payment_status, order_status, subtotal, tax, shipping_cost, total, notes, \
     payment_reference, stock_reserved, paid_at, cancelled_at, delivered_at, created_at, updated_at";

// =============================================================================
// Inputs
// =============================================================================

/// Checkout input. The items come from the user's stored cart.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Turns the user's cart into a confirmed order.
    ///
    /// See the module diagram for the steps. The returned order holds a
    /// stock reservation (`stock_reserved = true`).
    pub async fn place_order(&self, input: &NewOrder, pricing: &PricingConfig) -> DbResult<Order> {
        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        let cart = cart::load_cart(&mut *tx, &input.user_id).await?;
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        for line in &cart.items {
            let live = book::fetch_book(&mut *tx, &line.book_id)
                .await?
                .ok_or_else(|| CoreError::BookNotFound(line.book_id.clone()))?;

            if !live.can_supply(line.quantity) {
                return Err(CoreError::insufficient_stock(&live.id, live.stock, line.quantity).into());
            }

            book::decrement_stock(&mut *tx, &line.book_id, line.quantity).await?;
        }

        let now = Utc::now();

        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            order_number: generate_order_number(now),
            items: cart.to_order_lines(),
            shipping_address: input.shipping_address.clone(),
            payment_method: input.payment_method,
            payment_status: input.payment_method.initial_payment_status(),
            order_status: OrderStatus::Confirmed,
            costs: OrderCosts::default(),
            notes: input.notes.clone(),
            payment_reference: None,
            stock_reserved: true,
            paid_at: input.payment_method.settles_at_checkout().then_some(now),
            cancelled_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        order.price(pricing);

        insert_order(&mut *tx, &order).await?;
        cart::clear_cart(&mut *tx, &input.user_id).await?;

        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            user_id = %order.user_id,
            total = %order.costs.total,
            "Order placed"
        );
        Ok(order)
    }

    /// Gets an order by ID regardless of owner.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut *conn, id).await
    }

    /// Gets an order only if `user_id` owns it.
    pub async fn get_for_user(&self, id: &str, user_id: &str) -> DbResult<Option<Order>> {
        Ok(self
            .get_by_id(id)
            .await?
            .filter(|order| order.is_owned_by(user_id)))
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str, page: PageRequest) -> DbResult<Page<Order>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(page.limit as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows, page, total).await
    }

    /// Lists every order, newest first, optionally by status.
    pub async fn list_all(&self, status: Option<OrderStatus>, page: PageRequest) -> DbResult<Page<Order>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE (?1 IS NULL OR order_status = ?1)")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE (?1 IS NULL OR order_status = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(status)
        .bind(page.limit as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows, page, total).await
    }

    /// Moves an order along the status table.
    ///
    /// Moving to `cancelled` releases the stock reservation in the same
    /// transaction. Pass `owner` to scope the lookup to one user.
    pub async fn change_status(
        &self,
        order_id: &str,
        owner: Option<&str>,
        next: OrderStatus,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        let order = fetch_order(&mut *tx, order_id)
            .await?
            .filter(|order| owner.map_or(true, |user_id| order.is_owned_by(user_id)))
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let now = Utc::now();
        let plan = plan_status_change(&order, next, now)?;

        if plan.release_stock {
            release_stock(&mut *tx, &order).await?;
        }

        sqlx::query(
            r#"
            UPDATE orders SET
                order_status = ?2,
                delivered_at = COALESCE(?3, delivered_at),
                cancelled_at = COALESCE(?4, cancelled_at),
                stock_reserved = CASE WHEN ?5 THEN 0 ELSE stock_reserved END,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(plan.status)
        .bind(plan.delivered_at)
        .bind(plan.cancelled_at)
        .bind(plan.release_stock)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            order_id = %order_id,
            from = %order.order_status,
            to = %next,
            restocked = plan.release_stock,
            "Order status changed"
        );
        Ok(updated)
    }

    /// Cancels a user's own order.
    pub async fn cancel(&self, order_id: &str, user_id: &str) -> DbResult<Order> {
        self.change_status(order_id, Some(user_id), OrderStatus::Cancelled).await
    }

    /// Applies a verified gateway outcome.
    ///
    /// Returns the order after the write and what was done. Outcomes that
    /// repeat the stored state report `PaymentTransition::NoChange`.
    pub async fn apply_payment(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> DbResult<(Order, PaymentTransition)> {
        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        let order = fetch_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let transition = plan_payment(&order, outcome)?;
        let now = Utc::now();

        match &transition {
            PaymentTransition::NoChange => {
                tx.rollback().await?;
                debug!(order_id = %order_id, "Payment outcome already applied");
                return Ok((order, transition));
            }

            PaymentTransition::Complete {
                reference,
                reserve_stock,
                advance_to_confirmed,
            } => {
                if *reserve_stock {
                    for item in &order.items {
                        book::decrement_stock(&mut *tx, &item.book_id, item.quantity).await?;
                    }
                    cart::clear_cart(&mut *tx, &order.user_id).await?;
                }

                sqlx::query(
                    r#"
                    UPDATE orders SET
                        payment_status = 'completed',
                        payment_reference = ?2,
                        paid_at = ?3,
                        stock_reserved = 1,
                        order_status = CASE WHEN ?4 THEN 'confirmed' ELSE order_status END,
                        updated_at = ?3
                    WHERE id = ?1
                    "#,
                )
                .bind(order_id)
                .bind(reference)
                .bind(now)
                .bind(*advance_to_confirmed)
                .execute(&mut *tx)
                .await?;
            }

            PaymentTransition::Fail {
                cancel_order,
                release_stock: release,
            } => {
                if *release {
                    release_stock(&mut *tx, &order).await?;
                }

                sqlx::query(
                    r#"
                    UPDATE orders SET
                        payment_status = 'failed',
                        order_status = CASE WHEN ?2 THEN 'cancelled' ELSE order_status END,
                        cancelled_at = CASE WHEN ?2 THEN ?3 ELSE cancelled_at END,
                        stock_reserved = 0,
                        updated_at = ?3
                    WHERE id = ?1
                    "#,
                )
                .bind(order_id)
                .bind(*cancel_order)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        let updated = fetch_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            order_id = %order_id,
            payment_status = %updated.payment_status,
            order_status = %updated.order_status,
            "Payment outcome applied"
        );
        Ok((updated, transition))
    }

    async fn hydrate(&self, rows: Vec<OrderRow>, page: PageRequest, total: i64) -> DbResult<Page<Order>> {
        let mut conn = self.pool.acquire().await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = fetch_items(&mut *conn, &row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(Page::new(orders, page, total))
    }
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let items = fetch_items(&mut *conn, &row.id).await?;
            Ok(Some(row.into_order(items)?))
        }
        None => Ok(None),
    }
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLineItem>> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(
        r#"
        SELECT book_id, title, author, quantity, unit_price, subtotal
        FROM order_items
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(OrderLineItem::from).collect())
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    let shipping_address = serde_json::to_string(&order.shipping_address)?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, order_number, shipping_address, payment_method,
            payment_status, order_status, subtotal, tax, shipping_cost, total,
            notes, payment_reference, stock_reserved, paid_at, cancelled_at,
            delivered_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.order_number)
    .bind(shipping_address)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.order_status)
    .bind(order.costs.subtotal.minor())
    .bind(order.costs.tax.minor())
    .bind(order.costs.shipping_cost.minor())
    .bind(order.costs.total.minor())
    .bind(&order.notes)
    .bind(&order.payment_reference)
    .bind(order.stock_reserved)
    .bind(order.paid_at)
    .bind(order.cancelled_at)
    .bind(order.delivered_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, book_id, title, author, quantity, unit_price, subtotal)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(position as i64)
        .bind(&item.book_id)
        .bind(&item.title)
        .bind(&item.author)
        .bind(item.quantity)
        .bind(item.unit_price.minor())
        .bind(item.subtotal.minor())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn release_stock(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    for item in &order.items {
        book::increment_stock(&mut *conn, &item.book_id, item.quantity).await?;
    }
    Ok(())
}

// =============================================================================
// Order Numbers
// =============================================================================

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `ORD-<base36 ms timestamp>-<5 random base36>`, upper-case.
///
/// ## Example
/// `ORD-LZ3K9Q1C-7XQ2M`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("ORD-{}-{}", to_base36(now.timestamp_millis().max(0) as u64), suffix)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

// =============================================================================
// Unit Tests
// =============================================================================
