//! # Cart Repository
//!
//! Persists [`Cart`] values. All cart rules live in `bookstore_core::cart`;
//! this repository only loads and stores.
//!
//! One `carts` row per user, one `cart_items` row per (user, book). Saving a
//! cart rewrites its lines, so concurrent sessions of one user resolve as
//! last write wins.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bookstore_core::{Cart, CartLine, Money};

#[derive(Debug, FromRow)]
struct CartLineRow {
    book_id: String,
    title: String,
    author: String,
    quantity: i64,
    unit_price: i64,
    added_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            book_id: row.book_id,
            title: row.title,
            author: row.author,
            quantity: row.quantity,
            unit_price: Money::from_minor(row.unit_price),
            added_at: row.added_at,
        }
    }
}

/// Repository for cart persistence.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Loads the user's cart, creating an empty one on first access.
    pub async fn get_or_create(&self, user_id: &str) -> DbResult<Cart> {
        let mut conn = self.pool.acquire().await?;
        load_cart(&mut *conn, user_id).await
    }

    /// Replaces the stored lines with `cart`'s lines.
    pub async fn save(&self, cart: &Cart) -> DbResult<()> {
        debug!(user_id = %cart.user_id, lines = cart.items.len(), total = %cart.total, "Saving cart");

        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;

        ensure_cart_row(&mut *tx, &cart.user_id).await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(&cart.user_id)
            .execute(&mut *tx)
            .await?;

        for line in &cart.items {
            sqlx::query(
                r#"
                INSERT INTO cart_items (user_id, book_id, title, author, quantity, unit_price, added_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&cart.user_id)
            .bind(&line.book_id)
            .bind(&line.title)
            .bind(&line.author)
            .bind(line.quantity)
            .bind(line.unit_price.minor())
            .bind(line.added_at)
            .execute(&mut *tx)
            .await?;
        }

        touch(&mut *tx, &cart.user_id, cart.updated_at).await?;

        tx.commit().await.map_err(DbError::transaction)?;
        Ok(())
    }

    /// Empties the user's cart. The cart row itself is kept.
    pub async fn clear(&self, user_id: &str) -> DbResult<Cart> {
        let mut tx = self.pool.begin().await.map_err(DbError::transaction)?;
        ensure_cart_row(&mut *tx, user_id).await?;
        clear_cart(&mut *tx, user_id).await?;
        tx.commit().await.map_err(DbError::transaction)?;

        Ok(Cart::new(user_id))
    }
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

async fn ensure_cart_row(conn: &mut SqliteConnection, user_id: &str) -> DbResult<()> {
    let now = Utc::now();
    sqlx::query("INSERT OR IGNORE INTO carts (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)")
        .bind(user_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn touch(conn: &mut SqliteConnection, user_id: &str, at: DateTime<Utc>) -> DbResult<()> {
    sqlx::query("UPDATE carts SET updated_at = ?2 WHERE user_id = ?1")
        .bind(user_id)
        .bind(at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Loads a cart in lines-added order.
pub(crate) async fn load_cart(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Cart> {
    ensure_cart_row(&mut *conn, user_id).await?;

    let updated_at: DateTime<Utc> = sqlx::query_scalar("SELECT updated_at FROM carts WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    let rows: Vec<CartLineRow> = sqlx::query_as(
        r#"
        SELECT book_id, title, author, quantity, unit_price, added_at
        FROM cart_items
        WHERE user_id = ?1
        ORDER BY added_at, rowid
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Cart::from_lines(
        user_id,
        rows.into_iter().map(CartLine::from).collect(),
        updated_at,
    ))
}

pub(crate) async fn clear_cart(conn: &mut SqliteConnection, user_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    touch(&mut *conn, user_id, Utc::now()).await?;

    debug!(user_id = %user_id, "Cart cleared");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bookstore_core::{Book, NewBook};

    async fn setup() -> (Database, Book) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let book = db
            .books()
            .insert(&NewBook {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                isbn: None,
                description: None,
                category: "Science Fiction".to_string(),
                price: Money::from_minor(1000),
                stock: 5,
            })
            .await
            .unwrap();
        (db, book)
    }

    #[tokio::test]
    async fn test_first_access_creates_empty_cart() {
        let (db, _) = setup().await;
        let cart = db.carts().get_or_create("user-1").await.unwrap();
        assert!(cart.is_empty());
        assert!(cart.total.is_zero());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let (db, book) = setup().await;
        let carts = db.carts();

        let mut cart = carts.get_or_create("user-1").await.unwrap();
        cart.add_item(&book, 3).unwrap();
        carts.save(&cart).await.unwrap();

        let loaded = carts.get_or_create("user-1").await.unwrap();
        assert_eq!(loaded.quantity_of(&book.id), 3);
        assert_eq!(loaded.total.minor(), 3000);

        // Other users see their own cart
        assert!(carts.get_or_create("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (db, book) = setup().await;
        let carts = db.carts();

        let mut cart = carts.get_or_create("user-1").await.unwrap();
        cart.add_item(&book, 1).unwrap();
        carts.save(&cart).await.unwrap();

        assert!(carts.clear("user-1").await.unwrap().is_empty());
        assert!(carts.clear("user-1").await.unwrap().total.is_zero());
        assert!(carts.get_or_create("user-1").await.unwrap().is_empty());
    }
}
