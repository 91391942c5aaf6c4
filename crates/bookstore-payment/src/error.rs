//! # Payment Errors
//!
//! Failures of the gateway adapter itself. Whether a verified payment fits
//! an order (amount, ownership, state) is decided by the service layer.

use thiserror::Error;

/// Gateway adapter errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Callback data is not base64, not JSON, or misses a field.
    #[error("Invalid payment payload: {0}")]
    InvalidPayload(String),

    /// Signature does not match the one computed with our secret.
    #[error("Payment signature mismatch")]
    SignatureMismatch,

    /// Transport failure talking to the gateway.
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-2xx status or an unreadable body.
    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),

    /// Merchant configuration is unusable.
    #[error("Invalid payment configuration: {0}")]
    InvalidConfig(String),
}

impl PaymentError {
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        PaymentError::InvalidPayload(reason.into())
    }
}

/// Result type alias for gateway operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_do_not_leak_secrets() {
        assert_eq!(PaymentError::SignatureMismatch.to_string(), "Payment signature mismatch");
        assert_eq!(
            PaymentError::invalid_payload("not base64").to_string(),
            "Invalid payment payload: not base64"
        );
    }
}
