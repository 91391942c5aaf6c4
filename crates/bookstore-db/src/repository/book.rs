//! # Book Repository
//!
//! Catalog CRUD and stock movements.
//!
//! ## Stock Movements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Moves Stock                                      │
//! │                                                                         │
//! │  place_order ────────► decrement (conditional, inside order tx)        │
//! │  payment COMPLETE ───► decrement (only if order holds no reservation)  │
//! │  cancel / FAILED ────► increment (only if order holds a reservation)   │
//! │  catalog admin ──────► set_stock                                       │
//! │                                                                         │
//! │  The decrement is one statement:                                        │
//! │    UPDATE books SET stock = stock - q WHERE id = ? AND stock >= q       │
//! │  Two checkouts racing for the last copy cannot both match the row.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bookstore_core::{Book, CoreError, Money, NewBook, Page, PageRequest};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct BookRow {
    id: String,
    title: String,
    author: String,
    isbn: Option<String>,
    description: Option<String>,
    category: String,
    price: i64,
    stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            description: row.description,
            category: row.category,
            price: Money::from_minor(row.price),
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const BOOK_COLUMNS: &str =
    "id, title, author, isbn, description, category, price, stock, created_at, updated_at";

/// Catalog filter for [`BookRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Substring match on title, author or ISBN.
    pub search: Option<String>,
    /// Exact category.
    pub category: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog operations.
#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BookRepository { pool }
    }

    /// Gets a book by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Book>> {
        let mut conn = self.pool.acquire().await?;
        fetch_book(&mut *conn, id).await
    }

    /// Lists books ordered by title.
    pub async fn list(&self, filter: &BookFilter, page: PageRequest) -> DbResult<Page<Book>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let category = filter.category.as_deref().filter(|c| !c.trim().is_empty());

        debug!(?search, ?category, page = page.page, "Listing books");

        const WHERE: &str = "WHERE (?1 IS NULL OR category = ?1) \
             AND (?2 IS NULL OR title LIKE ?2 OR author LIKE ?2 OR isbn LIKE ?2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books {WHERE}"))
            .bind(category)
            .bind(search.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books {WHERE} ORDER BY title, id LIMIT ?3 OFFSET ?4"
        ))
        .bind(category)
        .bind(search.as_deref())
        .bind(page.limit as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(rows.into_iter().map(Book::from).collect(), page, total))
    }

    /// Inserts a new book and returns it.
    pub async fn insert(&self, input: &NewBook) -> DbResult<Book> {
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            author: input.author.trim().to_string(),
            isbn: input.isbn.clone(),
            description: input.description.clone(),
            category: input.category.trim().to_string(),
            price: input.price,
            stock: input.stock,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %book.id, title = %book.title, "Inserting book");

        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, isbn, description, category, price, stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.category)
        .bind(book.price.minor())
        .bind(book.stock)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| isbn_conflict(e.into(), book.isbn.as_deref()))?;

        Ok(book)
    }

    /// Writes every catalog field except stock.
    pub async fn update(&self, book: &Book) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE books SET
                title = ?2,
                author = ?3,
                isbn = ?4,
                description = ?5,
                category = ?6,
                price = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.category)
        .bind(book.price.minor())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| isbn_conflict(e.into(), book.isbn.as_deref()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", &book.id));
        }

        Ok(())
    }

    /// Deletes a book. Existing carts keep their captured lines;
    /// checkout then fails with `BookNotFound`.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        debug!(id = %id, "Book deleted");
        Ok(())
    }

    /// Sets stock to an absolute count (inventory recount).
    pub async fn set_stock(&self, id: &str, stock: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE books SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        Ok(())
    }

    /// Takes `quantity` copies if at least that many are on hand.
    pub async fn decrement_stock(&self, id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        decrement_stock(&mut *conn, id, quantity).await
    }

    /// Returns `quantity` copies to stock.
    pub async fn increment_stock(&self, id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        increment_stock(&mut *conn, id, quantity).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Names the ISBN that collided with the unique index.
fn isbn_conflict(err: DbError, isbn: Option<&str>) -> DbError {
    match (err, isbn) {
        (DbError::UniqueViolation { field, .. }, Some(isbn)) if field == "isbn" => {
            DbError::duplicate("isbn", isbn)
        }
        (err, _) => err,
    }
}

// =============================================================================
// Connection-Level Operations
// =============================================================================
// Used by the order repository inside its transactions.

pub(crate) async fn fetch_book(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Book>> {
    let row: Option<BookRow> = sqlx::query_as(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Book::from))
}

/// Conditional decrement.
///
/// ## Errors
/// - `Domain(InsufficientStock)` with the live count when the row did not match
/// - `Domain(BookNotFound)` when the book is gone
pub(crate) async fn decrement_stock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE books SET stock = stock - ?2, updated_at = ?3 WHERE id = ?1 AND stock >= ?2",
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM books WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        return Err(match available {
            Some(stock) => CoreError::insufficient_stock(id, stock, quantity).into(),
            None => CoreError::BookNotFound(id.to_string()).into(),
        });
    }

    debug!(book_id = %id, quantity, "Stock decremented");
    Ok(())
}

/// Credits stock back. A deleted book is skipped: there is nothing to restock.
pub(crate) async fn increment_stock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    let result = sqlx::query("UPDATE books SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(book_id = %id, quantity, "Restock skipped, book no longer exists");
    } else {
        debug!(book_id = %id, quantity, "Stock incremented");
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
