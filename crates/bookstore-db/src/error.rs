//! # Database Error Types
//!
//! ```text
//! sqlx::Error ─────────────┐
//! MigrateError ────────────┼──► DbError ──► ServiceError (bookstore-service)
//! CoreError (rule hit      │
//!   inside a transaction) ─┘
//! ```
//!
//! A `Domain` error always means the surrounding transaction was rolled
//! back, so nothing it touched was written.

use bookstore_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the row (ISBN, order number).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected the statement, including `CHECK (stock >= 0)`.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN or COMMIT failed; the unit of work did not land.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A business rule stopped the write.
    ///
    /// - Conditional stock decrement matched no row (`InsufficientStock`)
    /// - Status table forbids the move (`InvalidOrderTransition`)
    /// - Checkout found the cart empty (`EmptyCart`)
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// For `pool.begin()` and `tx.commit()` failures.
    pub fn transaction(err: sqlx::Error) -> Self {
        match DbError::from(err) {
            DbError::Internal(message) | DbError::QueryFailed(message) => {
                DbError::TransactionFailed(message)
            }
            other => other,
        }
    }

    /// The business error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// SQLite reports constraint failures only through the message text:
///
/// ```text
/// UNIQUE constraint failed: books.isbn   → UniqueViolation { field: "isbn" }
/// FOREIGN KEY constraint failed          → ForeignKeyViolation
/// CHECK constraint failed: stock >= 0    → QueryFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if let Some(column) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    let field = column.rsplit('.').next().unwrap_or(column);
                    DbError::duplicate(field, "unknown")
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// The shipping address column holds JSON.
impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("Corrupt JSON column: {}", err))
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_keep_their_message() {
        let err: DbError = CoreError::insufficient_stock("b1", 1, 3).into();
        assert!(err.as_domain().is_some());
        assert_eq!(
            err.to_string(),
            "Insufficient stock for book b1: available 1, requested 3"
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(DbError::not_found("Order", "o-1").to_string(), "Order not found: o-1");
    }

    #[test]
    fn test_closed_pool_is_a_connection_failure() {
        assert!(matches!(
            DbError::transaction(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
        assert!(matches!(
            DbError::transaction(sqlx::Error::WorkerCrashed),
            DbError::TransactionFailed(_)
        ));
    }
}
