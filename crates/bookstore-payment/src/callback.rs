//! # Callback Verification
//!
//! eSewa redirects the buyer to `success_url?data=<base64 JSON>`:
//!
//! ```json
//! {
//!   "transaction_code": "000AWEO",
//!   "status": "COMPLETE",
//!   "total_amount": "1,000.0",
//!   "transaction_uuid": "250610-162413",
//!   "product_code": "EPAYTEST",
//!   "signed_field_names": "transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names",
//!   "signature": "62GcfZTmVkzhtUeh+QJ1AqiJrjoWWGof3U+eTPTZ7fA="
//! }
//! ```
//!
//! ## Verification Order
//! 1. base64 → JSON object                 `InvalidPayload`
//! 2. `signed_field_names` present and covering
//!    [`REQUIRED_CALLBACK_FIELDS`]          `InvalidPayload`
//! 3. HMAC check over the named fields     `SignatureMismatch`
//! 4. field extraction, amount parsing     `InvalidPayload`
//!
//! The initiation form is signed over three fields without `status`, and the
//! buyer holds that signature, so a callback is never checked against it.
//!
//! The amount is checked against the order by the caller.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::EsewaConfig;
use crate::error::{PaymentError, PaymentResult};
use crate::signature;
use crate::status::GatewayStatus;
use bookstore_core::lifecycle::PaymentOutcome;
use bookstore_core::Money;

/// Fields a callback signature must cover.
pub const REQUIRED_CALLBACK_FIELDS: [&str; 4] =
    ["status", "total_amount", "transaction_uuid", "product_code"];

/// A callback whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsewaCallback {
    /// Gateway reference; absent on some failure callbacks.
    pub transaction_code: Option<String>,
    pub status: GatewayStatus,
    pub total_amount: Money,
    /// The order id sent at initiation.
    pub transaction_uuid: String,
    pub product_code: String,
}

impl EsewaCallback {
    /// See [`GatewayStatus::outcome`].
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        self.status.outcome(self.transaction_code.as_deref())
    }
}

/// Decodes and authenticates a callback payload.
pub fn verify_callback(payload: &str, config: &EsewaConfig) -> PaymentResult<EsewaCallback> {
    let fields = decode(payload)?;

    let signature = text_field(&fields, "signature")?;
    let signed_names = fields
        .get("signed_field_names")
        .and_then(Value::as_str)
        .ok_or_else(|| PaymentError::invalid_payload("missing field signed_field_names"))?;

    let names: Vec<&str> = signed_names.split(',').map(str::trim).filter(|n| !n.is_empty()).collect();
    if let Some(missing) = REQUIRED_CALLBACK_FIELDS.iter().find(|f| !names.contains(*f)) {
        warn!(signed_field_names = %signed_names, "Rejected callback that does not sign {missing}");
        return Err(PaymentError::invalid_payload(format!("{missing} is not signed")));
    }

    let mut pairs = Vec::new();
    for name in names {
        pairs.push((name.to_string(), text_field(&fields, name)?));
    }
    let message = signature::signing_message(pairs.iter().map(|(n, v)| (n.as_str(), v.as_str())));

    if let Err(e) = signature::verify(&config.secret_key, &message, &signature) {
        warn!(signed_field_names = %signed_names, "Rejected callback with bad signature");
        return Err(e);
    }

    let product_code = text_field(&fields, "product_code")?;
    if product_code != config.merchant_code {
        warn!(product_code = %product_code, "Rejected callback for another merchant");
        return Err(PaymentError::invalid_payload("product_code does not match merchant"));
    }

    let total_amount = Money::parse_decimal(&text_field(&fields, "total_amount")?)
        .map_err(|e| PaymentError::invalid_payload(e.to_string()))?;

    Ok(EsewaCallback {
        transaction_code: text_field(&fields, "transaction_code").ok().filter(|c| !c.is_empty()),
        status: GatewayStatus::parse(&text_field(&fields, "status")?),
        total_amount,
        transaction_uuid: text_field(&fields, "transaction_uuid")?,
        product_code,
    })
}

fn decode(payload: &str) -> PaymentResult<Map<String, Value>> {
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| PaymentError::invalid_payload("payload is not base64"))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(PaymentError::invalid_payload("payload is not a JSON object")),
        Err(_) => Err(PaymentError::invalid_payload("payload is not JSON")),
    }
}

/// Field value as the gateway signed it. Amounts may arrive as numbers.
fn text_field(fields: &Map<String, Value>, name: &str) -> PaymentResult<String> {
    match fields.get(name) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        _ => Err(PaymentError::invalid_payload(format!("missing field {name}"))),
    }
}
