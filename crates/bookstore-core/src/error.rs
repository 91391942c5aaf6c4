//! # Error Types
//!
//! Domain-specific error types for bookstore-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookstore-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bookstore-db          DbError       - Storage failures                 │
//! │  bookstore-payment     PaymentError  - Gateway / signature failures     │
//! │  bookstore-service     ServiceError  - What the HTTP layer sees         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ServiceError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::lifecycle::{OrderStatus, PaymentStatus};
use crate::types::PaymentMethod;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Book does not exist in the catalog.
    #[error("Book not found: {0}")]
    BookNotFound(String),

    /// The cart has no line for this book.
    #[error("Cart item not found: {0}")]
    CartItemNotFound(String),

    /// Order does not exist, or belongs to another user.
    ///
    /// Both cases share one variant so callers cannot probe for other
    /// users' order ids.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Checkout attempted with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Not enough stock to satisfy a cart line or an order line.
    ///
    /// ## User Workflow
    /// ```text
    /// stock = 5, cart already holds 3
    ///      │
    ///      ▼
    /// add_item(qty: 4)
    ///      │
    ///      ▼
    /// InsufficientStock { available: 2, requested: 4 }
    ///      │
    ///      ▼
    /// Storefront shows: "Only 2 more copies available"
    /// ```
    #[error("Insufficient stock for book {book_id}: available {available}, requested {requested}")]
    InsufficientStock {
        book_id: String,
        available: i64,
        requested: i64,
    },

    /// The order status table forbids this transition.
    #[error("Order cannot move from {from} to {to}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    /// The payment status table forbids this transition.
    #[error("Payment cannot move from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Operation requires a different payment method.
    #[error("Order is paid by {actual}, operation requires {expected}")]
    PaymentMethodMismatch {
        expected: PaymentMethod,
        actual: PaymentMethod,
    },

    /// Text did not name one of the enumerated order statuses.
    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    /// Cart has reached the maximum number of distinct lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for an insufficient stock error.
    pub fn insufficient_stock(book_id: impl Into<String>, available: i64, requested: i64) -> Self {
        CoreError::InsufficientStock {
            book_id: book_id.into(),
            available: available.max(0),
            requested,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g. invalid phone number, malformed amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::insufficient_stock("book-1", 2, 4);
        assert_eq!(
            err.to_string(),
            "Insufficient stock for book book-1: available 2, requested 4"
        );

        let err = CoreError::InvalidOrderTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Order cannot move from delivered to cancelled");
    }

    #[test]
    fn test_insufficient_stock_never_reports_negative_availability() {
        match CoreError::insufficient_stock("book-1", -3, 1) {
            CoreError::InsufficientStock { available, .. } => assert_eq!(available, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "full_name".to_string(),
        };
        assert_eq!(validation_err.to_string(), "full_name is required");

        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
