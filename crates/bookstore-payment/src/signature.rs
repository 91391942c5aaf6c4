//! # Request and Callback Signatures
//!
//! eSewa signs `name=value` pairs joined by `,` in the order given by
//! `signed_field_names`:
//!
//! ```text
//! signed_field_names = "total_amount,transaction_uuid,product_code"
//! message            = "total_amount=100,transaction_uuid=11-201-13,product_code=EPAYTEST"
//! signature          = base64(HMAC-SHA256(secret_key, message))
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, PaymentResult};

type HmacSha256 = Hmac<Sha256>;

/// Fields signed on payment initiation.
pub const INITIATION_SIGNED_FIELDS: &str = "total_amount,transaction_uuid,product_code";

/// Builds the canonical message from `(name, value)` pairs.
pub fn signing_message<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    fields
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn mac(secret: &str, message: &str) -> PaymentResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidConfig(format!("secret_key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac)
}

/// base64(HMAC-SHA256(secret, message)).
pub fn sign(secret: &str, message: &str) -> PaymentResult<String> {
    Ok(BASE64.encode(mac(secret, message)?.finalize().into_bytes()))
}

/// Checks `signature` in constant time.
///
/// A signature that is not valid base64 is a mismatch, not a payload error.
pub fn verify(secret: &str, message: &str, signature: &str) -> PaymentResult<()> {
    let provided = BASE64
        .decode(signature.trim())
        .map_err(|_| PaymentError::SignatureMismatch)?;

    mac(secret, message)?
        .verify_slice(&provided)
        .map_err(|_| PaymentError::SignatureMismatch)
}
