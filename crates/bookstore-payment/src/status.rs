//! # Gateway Status Mapping
//!
//! ```text
//! COMPLETE                               → PaymentOutcome::Completed
//! PENDING | AMBIENT_PENDING | AMBIGUOUS  → PaymentOutcome::Pending
//! FAILED | CANCELED | CANCELLED          → PaymentOutcome::Failed
//! anything else                          → unverified, no mutation
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use bookstore_core::lifecycle::PaymentOutcome;

/// Transaction status as reported by eSewa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GatewayStatus {
    Complete,
    Pending,
    AmbientPending,
    Ambiguous,
    Failed,
    Canceled,
    FullRefund,
    PartialRefund,
    NotFound,
    /// A status this adapter does not know.
    Other(String),
}

impl GatewayStatus {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" => GatewayStatus::Complete,
            "PENDING" => GatewayStatus::Pending,
            "AMBIENT_PENDING" => GatewayStatus::AmbientPending,
            "AMBIGUOUS" => GatewayStatus::Ambiguous,
            "FAILED" => GatewayStatus::Failed,
            // eSewa spells it with one L; accept both
            "CANCELED" | "CANCELLED" => GatewayStatus::Canceled,
            "FULL_REFUND" => GatewayStatus::FullRefund,
            "PARTIAL_REFUND" => GatewayStatus::PartialRefund,
            "NOT_FOUND" => GatewayStatus::NotFound,
            _ => GatewayStatus::Other(text.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GatewayStatus::Complete => "COMPLETE",
            GatewayStatus::Pending => "PENDING",
            GatewayStatus::AmbientPending => "AMBIENT_PENDING",
            GatewayStatus::Ambiguous => "AMBIGUOUS",
            GatewayStatus::Failed => "FAILED",
            GatewayStatus::Canceled => "CANCELED",
            GatewayStatus::FullRefund => "FULL_REFUND",
            GatewayStatus::PartialRefund => "PARTIAL_REFUND",
            GatewayStatus::NotFound => "NOT_FOUND",
            GatewayStatus::Other(text) => text,
        }
    }

    /// Maps the status onto the order lifecycle.
    ///
    /// `None` means the report cannot be trusted to change anything.
    /// `reference` is the gateway transaction code stored on completion.
    pub fn outcome(&self, reference: Option<&str>) -> Option<PaymentOutcome> {
        match self {
            GatewayStatus::Complete => Some(PaymentOutcome::Completed {
                reference: reference.unwrap_or_default().to_string(),
            }),
            GatewayStatus::Pending | GatewayStatus::AmbientPending | GatewayStatus::Ambiguous => {
                Some(PaymentOutcome::Pending)
            }
            GatewayStatus::Failed | GatewayStatus::Canceled => Some(PaymentOutcome::Failed),
            GatewayStatus::FullRefund
            | GatewayStatus::PartialRefund
            | GatewayStatus::NotFound
            | GatewayStatus::Other(_) => None,
        }
    }
}

impl From<String> for GatewayStatus {
    fn from(text: String) -> Self {
        GatewayStatus::parse(&text)
    }
}

impl From<GatewayStatus> for String {
    fn from(status: GatewayStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
