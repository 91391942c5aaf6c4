//! # bookstore-payment: eSewa Gateway Adapter
//!
//! Signs payment requests, authenticates callbacks and looks up transaction
//! status for eSewa ePay v2.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Order (esewa, pending)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PaymentForm::for_order ──► storefront posts form ──► eSewa             │
//! │                                                         │               │
//! │          ┌──────────────────────────────────────────────┘               │
//! │          ▼                                                              │
//! │  success_url?data=<base64>                                              │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  verify_callback ── signature ok ──► EsewaCallback                      │
//! │          │                              │                               │
//! │          ▼                              ▼                               │
//! │  SignatureMismatch           status.outcome() → PaymentOutcome          │
//! │                                                                         │
//! │  Reconciliation: PaymentGateway::fetch_status → StatusReport            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Merchant settings, sandbox defaults
//! - [`signature`] - HMAC-SHA256 signing and constant-time verification
//! - [`form`] - Signed initiation form
//! - [`callback`] - Callback decoding and authentication
//! - [`status`] - Gateway status → `PaymentOutcome`
//! - [`gateway`] - `PaymentGateway` trait and the reqwest client

pub mod callback;
pub mod config;
pub mod error;
pub mod form;
pub mod gateway;
pub mod signature;
pub mod status;

pub use callback::{verify_callback, EsewaCallback};
pub use config::EsewaConfig;
pub use error::{PaymentError, PaymentResult};
pub use form::PaymentForm;
pub use gateway::{EsewaClient, MockPaymentGateway, PaymentGateway, StatusQuery, StatusReport};
pub use status::GatewayStatus;
