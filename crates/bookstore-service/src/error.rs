//! # Service Error Type
//!
//! Unified error type for every service operation.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Bookstore                          │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──► DbError ──┐                          │
//! │                                              ├──► ServiceError          │
//! │                       PaymentError ──────────┘     { code, message,     │
//! │                                                      detail }           │
//! │                                                         │               │
//! │                                                         ▼               │
//! │                                         HTTP layer: code.http_status()  │
//! │                                                                         │
//! │  Storage and gateway failures are logged here and replaced with a      │
//! │  generic message; nothing below this layer reaches the client.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;

use bookstore_core::{CoreError, Money, ValidationError};
use bookstore_db::DbError;
use bookstore_payment::PaymentError;

/// Error returned by every service operation.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Only 2 copies of this book are available",
///   "detail": { "book_id": "…", "available": 2, "requested": 4 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// The actionable number behind stock and amount errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorDetail>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    BookNotFound,
    CartItemNotFound,
    OrderNotFound,
    EmptyCart,
    InsufficientStock,
    /// The order or payment is in a state that forbids the operation.
    InvalidState,
    InvalidStatus,
    SignatureMismatch,
    AmountMismatch,
    PaymentGatewayError,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status the web layer answers with.
    pub const fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ValidationError
            | ErrorCode::EmptyCart
            | ErrorCode::InvalidStatus
            | ErrorCode::SignatureMismatch
            | ErrorCode::AmountMismatch => 400,
            ErrorCode::NotFound
            | ErrorCode::BookNotFound
            | ErrorCode::CartItemNotFound
            | ErrorCode::OrderNotFound => 404,
            ErrorCode::InsufficientStock | ErrorCode::InvalidState => 409,
            ErrorCode::PaymentGatewayError => 502,
            ErrorCode::DatabaseError | ErrorCode::InternalError => 500,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::BookNotFound => "BOOK_NOT_FOUND",
            ErrorCode::CartItemNotFound => "CART_ITEM_NOT_FOUND",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::EmptyCart => "EMPTY_CART",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidStatus => "INVALID_STATUS",
            ErrorCode::SignatureMismatch => "SIGNATURE_MISMATCH",
            ErrorCode::AmountMismatch => "AMOUNT_MISMATCH",
            ErrorCode::PaymentGatewayError => "PAYMENT_GATEWAY_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload of stock and amount errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Stock {
        book_id: String,
        available: i64,
        requested: i64,
    },
    Amount {
        expected: Money,
        received: Money,
    },
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::InternalError, message)
    }

    /// Callback amount differs from the order total.
    pub fn amount_mismatch(expected: Money, received: Money) -> Self {
        ServiceError {
            code: ErrorCode::AmountMismatch,
            message: format!("Payment amount {received} does not match order total {expected}"),
            detail: Some(ErrorDetail::Amount { expected, received }),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::validation(err.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BookNotFound(id) => {
                ServiceError::new(ErrorCode::BookNotFound, format!("Book not found: {id}"))
            }
            CoreError::CartItemNotFound(id) => ServiceError::new(
                ErrorCode::CartItemNotFound,
                format!("Book {id} is not in the cart"),
            ),
            CoreError::OrderNotFound(id) => {
                ServiceError::new(ErrorCode::OrderNotFound, format!("Order not found: {id}"))
            }
            CoreError::EmptyCart => ServiceError::new(ErrorCode::EmptyCart, "Cart is empty"),
            CoreError::InsufficientStock {
                book_id,
                available,
                requested,
            } => ServiceError {
                code: ErrorCode::InsufficientStock,
                message: format!("Only {available} copies of this book are available"),
                detail: Some(ErrorDetail::Stock {
                    book_id,
                    available,
                    requested,
                }),
            },
            err @ (CoreError::InvalidOrderTransition { .. }
            | CoreError::InvalidPaymentTransition { .. }
            | CoreError::PaymentMethodMismatch { .. }) => ServiceError::invalid_state(err.to_string()),
            CoreError::InvalidStatus(status) => ServiceError::new(
                ErrorCode::InvalidStatus,
                format!("Invalid order status: {status}"),
            ),
            err @ CoreError::CartTooLarge { .. } => ServiceError::validation(err.to_string()),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => e.into(),
            DbError::NotFound { entity, id } => {
                ServiceError::new(ErrorCode::NotFound, format!("{entity} not found: {id}"))
            }
            DbError::UniqueViolation { field, value } => {
                ServiceError::validation(format!("{field} '{value}' already exists"))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ServiceError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ServiceError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidPayload(reason) => {
                ServiceError::validation(format!("Invalid payment data: {reason}"))
            }
            PaymentError::SignatureMismatch => {
                ServiceError::new(ErrorCode::SignatureMismatch, "Payment signature is invalid")
            }
            PaymentError::Http(e) => {
                tracing::error!("Payment gateway request failed: {}", e);
                ServiceError::new(ErrorCode::PaymentGatewayError, "Payment gateway is unavailable")
            }
            PaymentError::UnexpectedResponse(e) => {
                tracing::error!("Unexpected payment gateway response: {}", e);
                ServiceError::new(ErrorCode::PaymentGatewayError, "Payment gateway returned an error")
            }
            PaymentError::InvalidConfig(e) => {
                tracing::error!("Payment configuration invalid: {}", e);
                ServiceError::internal("Payment is not configured")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::OrderStatus;

    #[test]
    fn test_insufficient_stock_carries_available() {
        let err: ServiceError = CoreError::insufficient_stock("book-1", 2, 4).into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.http_status(), 409);
        assert_eq!(
            err.detail,
            Some(ErrorDetail::Stock {
                book_id: "book-1".to_string(),
                available: 2,
                requested: 4
            })
        );

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_STOCK");
        assert_eq!(json["detail"]["available"], 2);
    }

    #[test]
    fn test_domain_errors_pass_through_db_errors() {
        let err: ServiceError = DbError::Domain(CoreError::EmptyCart).into();
        assert_eq!(err.code, ErrorCode::EmptyCart);

        let err: ServiceError = DbError::Domain(CoreError::InvalidOrderTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Cancelled,
        })
        .into();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let err: ServiceError = DbError::QueryFailed("near \"SELEC\": syntax error".to_string()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("SELEC"));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_amount_mismatch_detail() {
        let err = ServiceError::amount_mismatch(Money::from_minor(3979), Money::from_minor(1));
        assert_eq!(err.code, ErrorCode::AmountMismatch);

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "AMOUNT_MISMATCH");
        assert_eq!(json["detail"]["expected"], 3979);
        assert_eq!(json["detail"]["received"], 1);
    }

    #[test]
    fn test_payment_errors() {
        let err: ServiceError = PaymentError::SignatureMismatch.into();
        assert_eq!(err.code, ErrorCode::SignatureMismatch);

        let err: ServiceError = PaymentError::invalid_payload("not base64").into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_every_code_serializes_as_its_str() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::CartItemNotFound,
            ErrorCode::PaymentGatewayError,
            ErrorCode::InternalError,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), code.as_str());
        }
    }
}
