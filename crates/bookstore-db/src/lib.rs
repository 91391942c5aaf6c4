//! # bookstore-db: Database Layer for the Bookstore
//!
//! SQLite storage for the catalog, carts and orders, using sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Bookstore Data Flow                             │
//! │                                                                         │
//! │  bookstore-service (OrderService::create_order)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bookstore-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ BookRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CartRepo      │    │ 001_initial  │  │   │
//! │  │   │ WAL, FKs on   │    │ OrderRepo     │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (./data/bookstore.db) or :memory: in tests                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Book, cart and order repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookstore_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/bookstore.db")).await?;
//!
//! let mut cart = db.carts().get_or_create("user-1").await?;
//! cart.add_item(&book, 2)?;
//! db.carts().save(&cart).await?;
//!
//! let order = db.orders().place_order(&checkout, &pricing).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::book::{BookFilter, BookRepository};
pub use repository::cart::CartRepository;
pub use repository::order::{generate_order_number, NewOrder, OrderRepository};
