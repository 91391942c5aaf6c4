//! # Validation Module
//!
//! Input validation for catalog, cart and checkout operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (outside this workspace)                          │
//! │  └── Body shape, deserialization                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services                                                      │
//! │  └── THIS MODULE: field rules before any store call                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (quantity > 0)                          │
//! │  └── UNIQUE order_number, PRIMARY KEY (user_id, book_id)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{NewBook, ShippingAddress};
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn require(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

pub fn validate_title(title: &str) -> ValidationResult<()> {
    require("title", title, 200)
}

pub fn validate_author(author: &str) -> ValidationResult<()> {
    require("author", author, 100)
}

pub fn validate_category(category: &str) -> ValidationResult<()> {
    require("category", category, 50)
}

/// Validates an ISBN.
///
/// ## Rules
/// - Hyphens and spaces are ignored
/// - 10 digits (last may be `X`) or 13 digits
///
/// Check digits are not verified.
pub fn validate_isbn(isbn: &str) -> ValidationResult<()> {
    let digits: String = isbn.chars().filter(|c| *c != '-' && *c != ' ').collect();
    let invalid = || ValidationError::InvalidFormat {
        field: "isbn".to_string(),
        reason: "must be 10 or 13 digits".to_string(),
    };

    match digits.len() {
        10 => {
            let (body, check) = digits.split_at(9);
            let body_ok = body.chars().all(|c| c.is_ascii_digit());
            let check_ok = check.chars().all(|c| c.is_ascii_digit() || c == 'X' || c == 'x');
            if body_ok && check_ok {
                Ok(())
            } else {
                Err(invalid())
            }
        }
        13 if digits.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query; empty means "no filter".
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart or order line quantity.
///
/// ## Rules
/// - At least 1
/// - At most [`MAX_LINE_QUANTITY`] (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Prices may be zero (free e-books), never negative.
pub fn validate_price_minor(minor: i64) -> ValidationResult<()> {
    if minor < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::Negative {
            field: "stock".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Every address field is required.
///
/// Fields are checked in form order so the first blank one is reported.
pub fn validate_shipping_address(address: &ShippingAddress) -> ValidationResult<()> {
    require("full_name", &address.full_name, 100)?;
    require("phone", &address.phone, 20)?;
    require("address", &address.address, 200)?;
    require("city", &address.city, 100)?;
    require("state", &address.state, 100)?;
    require("zip_code", &address.zip_code, 20)?;
    require("country", &address.country, 100)?;

    if !address
        .phone
        .trim()
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "may only contain digits, spaces and + - ( )".to_string(),
        });
    }

    Ok(())
}

/// Validates a catalog entry before insert or after applying an update.
pub fn validate_new_book(book: &NewBook) -> ValidationResult<()> {
    validate_title(&book.title)?;
    validate_author(&book.author)?;
    validate_category(&book.category)?;
    if let Some(isbn) = &book.isbn {
        validate_isbn(isbn)?;
    }
    if let Some(description) = &book.description {
        if description.chars().count() > 5000 {
            return Err(ValidationError::TooLong {
                field: "description".to_string(),
                max: 5000,
            });
        }
    }
    validate_price_minor(book.price.minor())?;
    validate_stock(book.stock)?;

    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
