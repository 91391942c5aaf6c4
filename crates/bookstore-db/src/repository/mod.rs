//! # Repository Module
//!
//! One repository per aggregate. Every repository wraps a clone of the
//! shared pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service                                                                │
//! │     │  db.orders().place_order(&input, &pricing)                        │
//! │     ▼                                                                   │
//! │  OrderRepository ──uses──► cart::load_cart / clear_cart                 │
//! │     │                      book::fetch_book / decrement_stock           │
//! │     │  one transaction                                                  │
//! │     ▼                                                                   │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Connection-level helpers (`pub(crate)`) take `&mut SqliteConnection` so
//! the order transactions can compose them.
//!
//! ## Available Repositories
//!
//! - [`BookRepository`](book::BookRepository) - Catalog CRUD, search, stock
//! - [`CartRepository`](cart::CartRepository) - Per-user cart persistence
//! - [`OrderRepository`](order::OrderRepository) - Checkout and order lifecycle

pub mod book;
pub mod cart;
pub mod order;
