//! # bookstore-core: Pure Business Logic for the Bookstore
//!
//! This crate holds the order lifecycle and cost engine as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookstore Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (routing, auth, JSON bodies)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bookstore-service                            │   │
//! │  │    CartService, OrderService, PaymentService, CatalogService    │   │
//! │  └──────────┬──────────────────┬───────────────────┬──────────────┘   │
//! │             │                  │                   │                   │
//! │  ┌──────────▼──────────────────▼───────┐  ┌────────▼──────────────┐   │
//! │  │   ★ bookstore-core (THIS CRATE) ★   │  │  bookstore-payment    │   │
//! │  │                                     │  │  eSewa signatures     │   │
//! │  │  ┌────────┐ ┌────────┐ ┌─────────┐  │  └───────────────────────┘   │
//! │  │  │  cart  │ │pricing │ │lifecycle│  │                              │
//! │  │  │  Cart  │ │ Costs  │ │ Status  │  │                              │
//! │  │  └────────┘ └────────┘ └─────────┘  │                              │
//! │  │   NO I/O • NO DATABASE • NO NETWORK │                              │
//! │  └──────────────────┬──────────────────┘                              │
//! │                     │                                                  │
//! │  ┌──────────────────▼──────────────────────────────────────────────┐   │
//! │  │                 bookstore-db (SQLite, transactions)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, Order, ShippingAddress, PaymentMethod)
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Cart lines, price capture, stock-aware quantity rules
//! - [`pricing`] - Subtotal, tax, shipping and total
//! - [`lifecycle`] - Order/payment status tables and transition planning
//! - [`pagination`] - Page requests and metadata
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use bookstore_core::money::Money;
//! use bookstore_core::pricing::{OrderCosts, PricingConfig};
//! use bookstore_core::types::OrderLineItem;
//!
//! let items = vec![
//!     OrderLineItem::new("b1", "Dune", "Frank Herbert", 2, Money::from_minor(1000)),
//!     OrderLineItem::new("b2", "Emma", "Jane Austen", 1, Money::from_minor(1500)),
//! ];
//! let costs = OrderCosts::compute(&items, &PricingConfig::default());
//!
//! // 35.00 + 8% tax + 1.99 shipping
//! assert_eq!(costs.total.minor(), 3979);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod pagination;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, PricePolicy};
pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{OrderStatus, PaymentStatus};
pub use money::Money;
pub use pagination::{Page, PageRequest, Pagination};
pub use pricing::{OrderCosts, PricingConfig};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in one cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single cart or order line.
///
/// Catches fat-fingered quantities (1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
