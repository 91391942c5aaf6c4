//! # eSewa Merchant Configuration
//!
//! Defaults point at the eSewa sandbox (`EPAYTEST`), so a fresh checkout
//! can run the whole payment flow without credentials.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{PaymentError, PaymentResult};

/// Sandbox merchant code.
pub const SANDBOX_MERCHANT_CODE: &str = "EPAYTEST";

/// Sandbox shared secret published by eSewa.
pub const SANDBOX_SECRET_KEY: &str = "8gBm/:&EnhH.1/q";

pub const SANDBOX_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";
pub const SANDBOX_STATUS_URL: &str = "https://rc.esewa.com.np/api/epay/transaction/status/";

/// Merchant settings for eSewa ePay v2.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EsewaConfig {
    /// `product_code` in every request.
    pub merchant_code: String,

    /// HMAC key. Never logged.
    pub secret_key: String,

    /// Where the storefront posts the payment form.
    pub form_url: String,

    /// Transaction status endpoint.
    pub status_url: String,

    /// eSewa redirects here with `?data=<base64>` on success.
    pub success_url: String,

    pub failure_url: String,

    /// Timeout for status lookups, in seconds.
    pub timeout_secs: u64,
}

impl Default for EsewaConfig {
    fn default() -> Self {
        EsewaConfig {
            merchant_code: SANDBOX_MERCHANT_CODE.to_string(),
            secret_key: SANDBOX_SECRET_KEY.to_string(),
            form_url: SANDBOX_FORM_URL.to_string(),
            status_url: SANDBOX_STATUS_URL.to_string(),
            success_url: "http://localhost:3000/payment/esewa/success".to_string(),
            failure_url: "http://localhost:3000/payment/esewa/failure".to_string(),
            timeout_secs: 10,
        }
    }
}

impl EsewaConfig {
    /// Sandbox settings with custom redirect URLs.
    pub fn sandbox(success_url: impl Into<String>, failure_url: impl Into<String>) -> Self {
        EsewaConfig {
            success_url: success_url.into(),
            failure_url: failure_url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_sandbox(&self) -> bool {
        self.merchant_code == SANDBOX_MERCHANT_CODE
    }

    /// Checks every field is usable.
    pub fn validate(&self) -> PaymentResult<()> {
        let required = [
            ("merchant_code", &self.merchant_code),
            ("secret_key", &self.secret_key),
            ("form_url", &self.form_url),
            ("status_url", &self.status_url),
            ("success_url", &self.success_url),
            ("failure_url", &self.failure_url),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PaymentError::InvalidConfig(format!("{field} is required")));
            }
        }

        for (field, url) in [
            ("form_url", &self.form_url),
            ("status_url", &self.status_url),
            ("success_url", &self.success_url),
            ("failure_url", &self.failure_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(PaymentError::InvalidConfig(format!("{field} must be an http(s) URL")));
            }
        }

        if self.timeout_secs == 0 {
            return Err(PaymentError::InvalidConfig("timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}

impl fmt::Debug for EsewaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsewaConfig")
            .field("merchant_code", &self.merchant_code)
            .field("secret_key", &"<redacted>")
            .field("form_url", &self.form_url)
            .field("status_url", &self.status_url)
            .field("success_url", &self.success_url)
            .field("failure_url", &self.failure_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sandbox_and_valid() {
        let config = EsewaConfig::default();
        assert!(config.is_sandbox());
        assert_eq!(config.secret_key, SANDBOX_SECRET_KEY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_and_non_http() {
        let blank = EsewaConfig {
            secret_key: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(blank.validate(), Err(PaymentError::InvalidConfig(_))));

        let bad_url = EsewaConfig::sandbox("ftp://shop/ok", "http://shop/fail");
        assert!(matches!(bad_url.validate(), Err(PaymentError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", EsewaConfig::default());
        assert!(!rendered.contains(SANDBOX_SECRET_KEY));
        assert!(rendered.contains("<redacted>"));
    }
}
