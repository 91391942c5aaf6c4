//! # Domain Types
//!
//! Core domain types shared by the cart, order and payment flows.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Book       │   │      Order      │   │ OrderLineItem   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  book_id        │       │
//! │  │  title, author  │   │  order_number   │   │  title (frozen) │       │
//! │  │  price          │   │  order_status   │   │  unit_price     │       │
//! │  │  stock          │   │  payment_status │   │  subtotal       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │ PaymentMethod   │   │ShippingAddress  │       │
//! │  │  bps (u32)      │   │ CashOnDelivery  │   │ full_name, ...  │       │
//! │  │  800 = 8%       │   │ Esewa, Card     │   │ (all required)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order Identity
//! Orders carry a UUID `id` used for relations and the gateway
//! `transaction_uuid`, plus a human-readable `order_number` for customers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::lifecycle::{OrderStatus, PaymentStatus};
use crate::money::Money;
use crate::pricing::{OrderCosts, PricingConfig};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 800 bps = 8%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Book
// =============================================================================

/// A catalog item with a mutable stock count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Book {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub title: String,

    pub author: String,

    /// ISBN-10 or ISBN-13, hyphens allowed.
    pub isbn: Option<String>,

    pub description: Option<String>,

    pub category: String,

    /// Current list price. Carts capture this at add time.
    pub price: Money,

    /// Copies on hand. Never negative.
    pub stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Checks whether `quantity` copies can be taken from stock.
    #[inline]
    pub fn can_supply(&self, quantity: i64) -> bool {
        quantity <= self.stock
    }

    #[inline]
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Input for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub price: Money,
    pub stock: i64,
}

impl From<&Book> for NewBook {
    fn from(book: &Book) -> Self {
        NewBook {
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            description: book.description.clone(),
            category: book.category.clone(),
            price: book.price,
            stock: book.stock,
        }
    }
}

/// Partial catalog update. `None` leaves a field unchanged.
///
/// There is no stock field: stock only moves through `set_stock` and
/// the order flows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
}

impl BookUpdate {
    /// Applies the set fields to `book`.
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(title) = &self.title {
            book.title = title.clone();
        }
        if let Some(author) = &self.author {
            book.author = author.clone();
        }
        if let Some(isbn) = &self.isbn {
            book.isbn = Some(isbn.clone());
        }
        if let Some(description) = &self.description {
            book.description = Some(description.clone());
        }
        if let Some(category) = &self.category {
            book.category = category.clone();
        }
        if let Some(price) = self.price {
            book.price = price;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == BookUpdate::default()
    }
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Delivery address embedded in every order. All fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays for an order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid in cash to the courier.
    CashOnDelivery,
    /// Paid through the eSewa wallet redirect flow.
    Esewa,
    /// Card captured by the storefront before checkout is submitted.
    Card,
}

impl PaymentMethod {
    /// Whether money has already changed hands when the order is placed.
    ///
    /// This is the single rule that seeds `payment_status` at checkout:
    /// - `Card` → `Completed`
    /// - `CashOnDelivery` → `Pending` until the courier collects
    /// - `Esewa` → `Pending` until the signed gateway callback arrives
    pub const fn settles_at_checkout(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }

    /// Payment status an order starts with.
    pub const fn initial_payment_status(&self) -> PaymentStatus {
        if self.settles_at_checkout() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Esewa => "esewa",
            PaymentMethod::Card => "card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash_on_delivery" | "cod" => Ok(PaymentMethod::CashOnDelivery),
            "esewa" => Ok(PaymentMethod::Esewa),
            "card" => Ok(PaymentMethod::Card),
            other => Err(CoreError::Validation(
                crate::error::ValidationError::InvalidFormat {
                    field: "payment_method".to_string(),
                    reason: format!("unknown payment method '{}'", other),
                },
            )),
        }
    }
}

// =============================================================================
// Order Line Item
// =============================================================================

/// A line of an order.
/// Uses the snapshot pattern to freeze book data at checkout, so later
/// catalog price edits never rewrite historical orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineItem {
    pub book_id: String,
    /// Title at checkout (frozen).
    pub title: String,
    /// Author at checkout (frozen).
    pub author: String,
    pub quantity: i64,
    /// Price captured in the cart (frozen).
    pub unit_price: Money,
    /// quantity × unit_price.
    pub subtotal: Money,
}

impl OrderLineItem {
    /// Builds a line, deriving the subtotal.
    pub fn new(
        book_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        OrderLineItem {
            book_id: book_id.into(),
            title: title.into(),
            author: author.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply_quantity(quantity),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order.
///
/// Costs are computed once at creation and the item list never changes
/// afterwards. Status fields move only through the tables in
/// [`crate::lifecycle`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// `ORD-<base36 timestamp>-<5 random base36>`.
    pub order_number: String,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub costs: OrderCosts,
    pub notes: Option<String>,
    /// Gateway transaction code once payment is confirmed.
    pub payment_reference: Option<String>,
    /// Whether this order currently holds a stock debit.
    pub stock_reserved: bool,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether `user_id` owns this order.
    #[inline]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Prices the order from its line items. A priced order keeps its costs.
    pub fn price(&mut self, config: &PricingConfig) {
        self.costs = OrderCosts::compute_once(&self.costs, &self.items, config);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
