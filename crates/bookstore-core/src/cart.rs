//! # Cart Engine
//!
//! Pure cart math. The service layer loads a [`Cart`], applies one of these
//! operations against a freshly read [`Book`], and persists the result.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operation              Checks (in order)              Effect           │
//! │  ─────────              ─────────────────              ──────           │
//! │                                                                         │
//! │  add_item(book, q) ───► 1 ≤ q ≤ 999                                     │
//! │                         in_cart + q ≤ stock ─────────► qty += q         │
//! │                         lines < 100 (new line only)    or new line      │
//! │                                                                         │
//! │  update_item(book, q) ► line exists                                     │
//! │                         1 ≤ q ≤ 999, q ≤ stock ──────► qty = q          │
//! │                                                                         │
//! │  remove_item(id) ─────► line exists ─────────────────► line removed     │
//! │                                                                         │
//! │  clear() ─────────────► (none) ──────────────────────► no lines         │
//! │                                                                         │
//! │  Every write recomputes total = Σ quantity × unit_price.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Book, OrderLineItem};
use crate::validation::validate_quantity;
use crate::MAX_CART_LINES;

// =============================================================================
// Cart Line
// =============================================================================

/// One book in a cart.
///
/// ## Price Capture
/// `unit_price` is taken from the book when the line is created. Later
/// catalog price changes do not touch it unless the caller asks for
/// [`PricePolicy::Refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn from_book(book: &Book, quantity: i64) -> Self {
        CartLine {
            book_id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            quantity,
            unit_price: book.price,
            added_at: Utc::now(),
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Freezes this line into an order line.
    pub fn to_order_line(&self) -> OrderLineItem {
        OrderLineItem::new(
            self.book_id.clone(),
            self.title.clone(),
            self.author.clone(),
            self.quantity,
            self.unit_price,
        )
    }
}

impl From<&CartLine> for OrderLineItem {
    fn from(line: &CartLine) -> Self {
        line.to_order_line()
    }
}

/// Whether a quantity update keeps the captured price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePolicy {
    /// Keep the price captured when the line was added.
    #[default]
    Keep,
    /// Re-capture price, title and author from the live book.
    Refresh,
}

// =============================================================================
// Cart
// =============================================================================

/// A user's cart.
///
/// ## Invariants
/// - At most one line per book (adding again increases quantity)
/// - Every quantity is ≥ 1
/// - `total` always equals Σ line totals
/// - At most [`MAX_CART_LINES`] lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<CartLine>,
    pub total: Money,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new(user_id: impl Into<String>) -> Self {
        Cart {
            user_id: user_id.into(),
            items: Vec::new(),
            total: Money::zero(),
            updated_at: Utc::now(),
        }
    }

    /// Rebuilds a cart from stored lines, deriving the total.
    pub fn from_lines(user_id: impl Into<String>, items: Vec<CartLine>, updated_at: DateTime<Utc>) -> Self {
        let mut cart = Cart {
            user_id: user_id.into(),
            items,
            total: Money::zero(),
            updated_at,
        };
        cart.total = cart.items.iter().map(CartLine::line_total).sum();
        cart
    }

    /// Adds `quantity` copies of `book`, merging into an existing line.
    ///
    /// ## Errors
    /// - `Validation` if quantity is outside 1..=999 (also for the merged line)
    /// - `InsufficientStock` with `available = stock - already in cart`
    /// - `CartTooLarge` when a new line would exceed the line cap
    pub fn add_item(&mut self, book: &Book, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let in_cart = self.quantity_of(&book.id);
        let wanted = in_cart + quantity;
        if wanted > book.stock {
            return Err(CoreError::insufficient_stock(
                &book.id,
                book.stock - in_cart,
                quantity,
            ));
        }

        if let Some(line) = self.line_mut(&book.id) {
            validate_quantity(wanted)?;
            line.quantity = wanted;
        } else {
            if self.items.len() >= MAX_CART_LINES {
                return Err(CoreError::CartTooLarge { max: MAX_CART_LINES });
            }
            self.items.push(CartLine::from_book(book, quantity));
        }

        self.recalculate();
        Ok(())
    }

    /// Sets the quantity of an existing line.
    ///
    /// Stock is checked against the absolute quantity, so
    /// `available` in the error is the book's full stock.
    pub fn update_item(&mut self, book: &Book, quantity: i64, policy: PricePolicy) -> CoreResult<()> {
        if !self.contains(&book.id) {
            return Err(CoreError::CartItemNotFound(book.id.clone()));
        }
        validate_quantity(quantity)?;
        if quantity > book.stock {
            return Err(CoreError::insufficient_stock(&book.id, book.stock, quantity));
        }

        if let Some(line) = self.line_mut(&book.id) {
            line.quantity = quantity;
            if policy == PricePolicy::Refresh {
                line.unit_price = book.price;
                line.title = book.title.clone();
                line.author = book.author.clone();
            }
        }

        self.recalculate();
        Ok(())
    }

    /// Removes the line for `book_id` and returns it.
    pub fn remove_item(&mut self, book_id: &str) -> CoreResult<CartLine> {
        let index = self
            .items
            .iter()
            .position(|line| line.book_id == book_id)
            .ok_or_else(|| CoreError::CartItemNotFound(book_id.to_string()))?;

        let removed = self.items.remove(index);
        self.recalculate();
        Ok(removed)
    }

    /// Empties the cart. Idempotent.
    pub fn clear(&mut self) {
        self.items.clear();
        self.recalculate();
    }

    pub fn contains(&self, book_id: &str) -> bool {
        self.items.iter().any(|line| line.book_id == book_id)
    }

    /// Quantity of `book_id` in the cart, 0 if absent.
    pub fn quantity_of(&self, book_id: &str) -> i64 {
        self.items
            .iter()
            .find(|line| line.book_id == book_id)
            .map_or(0, |line| line.quantity)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of copies across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Snapshot of every line as order lines.
    pub fn to_order_lines(&self) -> Vec<OrderLineItem> {
        self.items.iter().map(OrderLineItem::from).collect()
    }

    fn line_mut(&mut self, book_id: &str) -> Option<&mut CartLine> {
        self.items.iter_mut().find(|line| line.book_id == book_id)
    }

    fn recalculate(&mut self) {
        self.total = self.items.iter().map(CartLine::line_total).sum();
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
