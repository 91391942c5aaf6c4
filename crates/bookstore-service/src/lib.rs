//! # bookstore-service: Bookstore Use Cases
//!
//! The layer an HTTP router calls into. Every operation takes ids the caller
//! has already authenticated and returns [`ServiceResult`].
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppConfig::load(path)                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Bookstore::connect(config)                                             │
//! │       ├── Database::new(config.db_config())   (pool + migrations)      │
//! │       ├── EsewaClient::new(config.esewa)      (status checks)          │
//! │       │                                                                 │
//! │       ├── catalog   CatalogService                                      │
//! │       ├── carts     CartService      ── PricingConfig                   │
//! │       ├── orders    OrderService     ── PricingConfig, refund window    │
//! │       └── payments  PaymentService   ── EsewaConfig, dyn PaymentGateway │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - `bookstore.toml` + `BOOKSTORE_*` overrides
//! - [`telemetry`] - tracing subscriber
//! - [`error`] - `ServiceError` and error codes
//! - [`catalog`], [`cart`], [`order`], [`payment`] - use cases

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod order;
pub mod payment;
pub mod telemetry;

use std::sync::Arc;
use tracing::info;

pub use cart::{CartService, CartSummary};
pub use catalog::CatalogService;
pub use config::{AppConfig, ConfigError};
pub use error::{ErrorCode, ErrorDetail, ServiceError, ServiceResult};
pub use order::{CreateOrderRequest, OrderService};
pub use payment::{PaymentService, VerificationOutcome};

use bookstore_db::Database;
use bookstore_payment::{EsewaClient, PaymentGateway};

/// Every service, sharing one pool.
#[derive(Debug, Clone)]
pub struct Bookstore {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub orders: OrderService,
    pub payments: PaymentService,
    db: Database,
}

impl Bookstore {
    /// Opens the database and builds the eSewa client from `config`.
    pub async fn connect(config: &AppConfig) -> ServiceResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let gateway = EsewaClient::new(config.esewa.clone())?;

        info!(
            database = %config.database.path.display(),
            merchant = %config.esewa.merchant_code,
            sandbox = config.esewa.is_sandbox(),
            "Bookstore services ready"
        );
        Ok(Self::with_gateway(config, db, Arc::new(gateway)))
    }

    /// Builds the services over an open database and any gateway.
    pub fn with_gateway(config: &AppConfig, db: Database, gateway: Arc<dyn PaymentGateway>) -> Self {
        let pricing = config.pricing();

        Bookstore {
            catalog: CatalogService::new(db.clone()),
            carts: CartService::new(db.clone(), pricing),
            orders: OrderService::new(db.clone(), pricing, config.orders.refund_window_days),
            payments: PaymentService::new(db.clone(), config.esewa.clone(), gateway),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Closes the pool.
    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}
