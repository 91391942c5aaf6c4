//! # Gateway Client
//!
//! Out-of-band transaction status lookups:
//!
//! ```text
//! GET {status_url}?product_code=EPAYTEST&total_amount=39.79&transaction_uuid=<order id>
//!
//! 200 OK
//! {
//!   "product_code": "EPAYTEST",
//!   "transaction_uuid": "<order id>",
//!   "total_amount": 39.79,
//!   "status": "COMPLETE",
//!   "ref_id": "0001TS9"
//! }
//! ```
//!
//! Services depend on [`PaymentGateway`], not on [`EsewaClient`], so they can
//! be tested with `MockPaymentGateway`.

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::EsewaConfig;
use crate::error::{PaymentError, PaymentResult};
use crate::status::GatewayStatus;
use bookstore_core::lifecycle::PaymentOutcome;
use bookstore_core::Money;

/// Identifies one transaction at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    pub transaction_uuid: String,
    pub total_amount: Money,
}

/// What the gateway reports about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: GatewayStatus,
    /// Gateway reference, present once the payment completed.
    pub ref_id: Option<String>,
    /// The amount the gateway holds for the transaction, when it echoes one.
    pub total_amount: Option<Money>,
}

impl StatusReport {
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        self.status.outcome(self.ref_id.as_deref())
    }
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the gateway for the current state of a transaction.
    async fn fetch_status(&self, query: &StatusQuery) -> PaymentResult<StatusReport>;
}

/// HTTP client for the eSewa status endpoint.
#[derive(Debug, Clone)]
pub struct EsewaClient {
    config: EsewaConfig,
    http: Client,
}

impl EsewaClient {
    pub fn new(config: EsewaConfig) -> PaymentResult<Self> {
        config.validate()?;
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(EsewaClient { config, http })
    }

    pub fn config(&self) -> &EsewaConfig {
        &self.config
    }
}

#[async_trait]
impl PaymentGateway for EsewaClient {
    async fn fetch_status(&self, query: &StatusQuery) -> PaymentResult<StatusReport> {
        let total_amount = query.total_amount.to_decimal_string();

        debug!(
            transaction_uuid = %query.transaction_uuid,
            total_amount = %total_amount,
            "Fetching gateway status"
        );

        let response = self
            .http
            .get(&self.config.status_url)
            .query(&[
                ("product_code", self.config.merchant_code.as_str()),
                ("total_amount", total_amount.as_str()),
                ("transaction_uuid", query.transaction_uuid.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(PaymentError::UnexpectedResponse(format!(
                "status request failed with {status}: {text}"
            )));
        }

        let body = response.text().await?;
        parse_status_body(&body)
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: GatewayStatus,
    #[serde(default)]
    ref_id: Option<Value>,
    #[serde(default)]
    total_amount: Option<Value>,
}

fn parse_status_body(body: &str) -> PaymentResult<StatusReport> {
    let parsed: StatusBody = serde_json::from_str(body)
        .map_err(|e| PaymentError::UnexpectedResponse(format!("unreadable status body: {e}")))?;

    // ref_id is null until the payment completes, and sometimes numeric
    let ref_id = match parsed.ref_id {
        Some(Value::String(text)) if !text.is_empty() => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    };

    let total_amount = match parsed.total_amount {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
    .map(|text| {
        Money::parse_decimal(&text)
            .map_err(|e| PaymentError::UnexpectedResponse(format!("unreadable total_amount: {e}")))
    })
    .transpose()?;

    Ok(StatusReport {
        status: parsed.status,
        ref_id,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_status() {
        let report = parse_status_body(
            r#"{"product_code":"EPAYTEST","transaction_uuid":"order-1","total_amount":39.79,"status":"COMPLETE","ref_id":"0001TS9"}"#,
        )
        .unwrap();

        assert_eq!(report.status, GatewayStatus::Complete);
        assert_eq!(report.total_amount, Some(Money::from_minor(3979)));
        assert_eq!(
            report.outcome(),
            Some(PaymentOutcome::Completed {
                reference: "0001TS9".to_string()
            })
        );
    }

    #[test]
    fn test_parse_pending_status_without_ref() {
        let report = parse_status_body(
            r#"{"product_code":"EPAYTEST","transaction_uuid":"order-1","total_amount":39.79,"status":"PENDING","ref_id":null}"#,
        )
        .unwrap();

        assert_eq!(report.ref_id, None);
        assert_eq!(report.outcome(), Some(PaymentOutcome::Pending));
    }

    #[test]
    fn test_parse_amount_forms() {
        let text = parse_status_body(r#"{"status":"COMPLETE","total_amount":"1,000.0","ref_id":"R1"}"#).unwrap();
        assert_eq!(text.total_amount, Some(Money::from_minor(100000)));

        let absent = parse_status_body(r#"{"status":"PENDING"}"#).unwrap();
        assert_eq!(absent.total_amount, None);

        let garbage = parse_status_body(r#"{"status":"COMPLETE","total_amount":"lots"}"#);
        assert!(matches!(garbage, Err(PaymentError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_parse_error_body() {
        let result = parse_status_body(r#"{"code":0,"error_message":"Service is currently unavailable"}"#);
        assert!(matches!(result, Err(PaymentError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = EsewaConfig {
            merchant_code: String::new(),
            ..Default::default()
        };
        assert!(matches!(EsewaClient::new(config), Err(PaymentError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_mock_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_status().returning(|_| {
            Ok(StatusReport {
                status: GatewayStatus::Canceled,
                ref_id: None,
                total_amount: None,
            })
        });

        let report = gateway
            .fetch_status(&StatusQuery {
                transaction_uuid: "order-1".to_string(),
                total_amount: Money::from_minor(3979),
            })
            .await
            .unwrap();
        assert_eq!(report.outcome(), Some(PaymentOutcome::Failed));
    }
}
