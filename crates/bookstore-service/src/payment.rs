//! # Payment Service
//!
//! Drives the order lifecycle from eSewa reports.
//!
//! ## Verification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  verify(data)                                                           │
//! │    1. verify_callback          VALIDATION_ERROR / SIGNATURE_MISMATCH   │
//! │    2. order by transaction_uuid                     ORDER_NOT_FOUND    │
//! │    3. amount == order total                         AMOUNT_MISMATCH    │
//! │    4. status → outcome                                                  │
//! │         COMPLETE ............ completed (+ debit if not reserved)       │
//! │         PENDING/AMBIGUOUS ... unchanged                                 │
//! │         FAILED/CANCELED ..... failed, order cancelled, restocked        │
//! │         anything else ....... Unverified, nothing written               │
//! │                                                                         │
//! │  check_status(order) asks the gateway instead of trusting a redirect,   │
//! │  then applies the same mapping when it disagrees with the stored state. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};
use bookstore_core::lifecycle::{PaymentOutcome, PaymentTransition};
use bookstore_core::{CoreError, Order, OrderStatus, PaymentMethod, PaymentStatus};
use bookstore_db::Database;
use bookstore_payment::{
    verify_callback, EsewaConfig, GatewayStatus, PaymentForm, PaymentGateway, StatusQuery,
};

/// What a gateway report did to its order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The order was updated.
    Applied { order: Order },
    /// The order already reflected the report.
    Unchanged { order: Order },
    /// The gateway status does not map onto the order; nothing was written.
    Unverified { order: Order, status: GatewayStatus },
}

impl VerificationOutcome {
    pub fn order(&self) -> &Order {
        match self {
            VerificationOutcome::Applied { order }
            | VerificationOutcome::Unchanged { order }
            | VerificationOutcome::Unverified { order, .. } => order,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, VerificationOutcome::Applied { .. })
    }
}

/// eSewa payment use cases.
#[derive(Clone)]
pub struct PaymentService {
    db: Database,
    esewa: EsewaConfig,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(db: Database, esewa: EsewaConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        PaymentService { db, esewa, gateway }
    }

    /// Signed form for paying one of the user's eSewa orders.
    pub async fn initiate(&self, order_id: &str, user_id: &str) -> ServiceResult<PaymentForm> {
        let order = self
            .db
            .orders()
            .get_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        ensure_esewa(&order)?;
        if order.order_status == OrderStatus::Cancelled {
            return Err(ServiceError::invalid_state("Order is cancelled"));
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(ServiceError::invalid_state(format!(
                "Payment is already {}",
                order.payment_status
            )));
        }

        let form = PaymentForm::for_order(&order, &self.esewa)?;
        info!(
            order_number = %order.order_number,
            total_amount = %form.total_amount,
            "Payment initiated"
        );
        Ok(form)
    }

    /// Authenticates a callback payload and applies it to its order.
    pub async fn verify(&self, payload: &str) -> ServiceResult<VerificationOutcome> {
        let callback = verify_callback(payload, &self.esewa)?;

        let order = self
            .db
            .orders()
            .get_by_id(&callback.transaction_uuid)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(callback.transaction_uuid.clone()))?;
        ensure_esewa(&order)?;

        if callback.total_amount != order.costs.total {
            warn!(
                order_id = %order.id,
                expected = %order.costs.total,
                received = %callback.total_amount,
                "Rejected callback with wrong amount"
            );
            return Err(ServiceError::amount_mismatch(order.costs.total, callback.total_amount));
        }

        match callback.outcome() {
            Some(outcome) => self.apply(&order.id, outcome).await,
            None => {
                warn!(order_id = %order.id, status = %callback.status, "Callback status not actionable");
                Ok(VerificationOutcome::Unverified {
                    order,
                    status: callback.status,
                })
            }
        }
    }

    /// Asks the gateway about an order and reconciles the stored state.
    pub async fn check_status(&self, order_id: &str) -> ServiceResult<VerificationOutcome> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        ensure_esewa(&order)?;

        let report = self
            .gateway
            .fetch_status(&StatusQuery {
                transaction_uuid: order.id.clone(),
                total_amount: order.costs.total,
            })
            .await?;

        info!(order_id = %order.id, status = %report.status, "Gateway status fetched");

        if let Some(reported) = report.total_amount.filter(|amount| *amount != order.costs.total) {
            warn!(
                order_id = %order.id,
                expected = %order.costs.total,
                received = %reported,
                "Gateway reported a different amount"
            );
            return Err(ServiceError::amount_mismatch(order.costs.total, reported));
        }

        match report.outcome() {
            None => Ok(VerificationOutcome::Unverified {
                order,
                status: report.status,
            }),
            Some(outcome) if reported_status(&outcome) == order.payment_status => {
                Ok(VerificationOutcome::Unchanged { order })
            }
            Some(outcome) => self.apply(&order.id, outcome).await,
        }
    }

    async fn apply(&self, order_id: &str, outcome: PaymentOutcome) -> ServiceResult<VerificationOutcome> {
        let (order, transition) = self.db.orders().apply_payment(order_id, outcome).await?;

        Ok(match transition {
            PaymentTransition::NoChange => VerificationOutcome::Unchanged { order },
            PaymentTransition::Complete { .. } | PaymentTransition::Fail { .. } => {
                VerificationOutcome::Applied { order }
            }
        })
    }
}

impl fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentService")
            .field("esewa", &self.esewa)
            .finish_non_exhaustive()
    }
}

fn ensure_esewa(order: &Order) -> Result<(), CoreError> {
    if order.payment_method != PaymentMethod::Esewa {
        return Err(CoreError::PaymentMethodMismatch {
            expected: PaymentMethod::Esewa,
            actual: order.payment_method,
        });
    }
    Ok(())
}

fn reported_status(outcome: &PaymentOutcome) -> PaymentStatus {
    match outcome {
        PaymentOutcome::Completed { .. } => PaymentStatus::Completed,
        PaymentOutcome::Pending => PaymentStatus::Pending,
        PaymentOutcome::Failed => PaymentStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ErrorDetail};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use bookstore_core::{Book, Money, NewBook, PricingConfig, ShippingAddress};
    use bookstore_db::{DbConfig, NewOrder};
    use bookstore_payment::signature;
    use bookstore_payment::{MockPaymentGateway, PaymentError, StatusReport};
    use serde_json::json;

    const SIGNED_FIELDS: &str =
        "transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names";

    struct Fixture {
        db: Database,
        dune: Book,
        order: Order,
    }

    async fn setup(method: PaymentMethod) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dune = db
            .books()
            .insert(&NewBook {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                isbn: None,
                description: None,
                category: "Science Fiction".to_string(),
                price: Money::from_minor(1000),
                stock: 10,
            })
            .await
            .unwrap();
        let emma = db
            .books()
            .insert(&NewBook {
                title: "Emma".to_string(),
                author: "Jane Austen".to_string(),
                isbn: None,
                description: None,
                category: "Classics".to_string(),
                price: Money::from_minor(1500),
                stock: 3,
            })
            .await
            .unwrap();

        let mut cart = db.carts().get_or_create("user-1").await.unwrap();
        cart.add_item(&dune, 2).unwrap();
        cart.add_item(&emma, 1).unwrap();
        db.carts().save(&cart).await.unwrap();

        let order = db
            .orders()
            .place_order(
                &NewOrder {
                    user_id: "user-1".to_string(),
                    shipping_address: ShippingAddress {
                        full_name: "Sita Sharma".to_string(),
                        phone: "9800000000".to_string(),
                        address: "Thamel Marg 12".to_string(),
                        city: "Kathmandu".to_string(),
                        state: "Bagmati".to_string(),
                        zip_code: "44600".to_string(),
                        country: "Nepal".to_string(),
                    },
                    payment_method: method,
                    notes: None,
                },
                &PricingConfig::default(),
            )
            .await
            .unwrap();

        Fixture { db, dune, order }
    }

    fn service(db: &Database, gateway: MockPaymentGateway) -> PaymentService {
        PaymentService::new(db.clone(), EsewaConfig::default(), Arc::new(gateway))
    }

    /// Base64 callback body signed with the sandbox secret.
    fn callback(order_id: &str, status: &str, amount: &str) -> String {
        let config = EsewaConfig::default();
        let mut body = json!({
            "transaction_code": "000AWEO",
            "status": status,
            "total_amount": amount,
            "transaction_uuid": order_id,
            "product_code": config.merchant_code,
            "signed_field_names": SIGNED_FIELDS,
        });
        let message = signature::signing_message(
            SIGNED_FIELDS
                .split(',')
                .map(|name| (name, body[name].as_str().unwrap()))
                .collect::<Vec<_>>(),
        );
        body["signature"] = json!(signature::sign(&config.secret_key, &message).unwrap());
        BASE64.encode(body.to_string())
    }

    async fn stock(db: &Database, book: &Book) -> i64 {
        db.books().get_by_id(&book.id).await.unwrap().unwrap().stock
    }

    async fn reload(db: &Database, order: &Order) -> Order {
        db.orders().get_by_id(&order.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_initiate_builds_signed_form() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());

        let form = payments.initiate(&fx.order.id, "user-1").await.unwrap();
        assert_eq!(form.total_amount, "39.79");
        assert_eq!(form.transaction_uuid, fx.order.id);

        let message = format!(
            "total_amount=39.79,transaction_uuid={},product_code=EPAYTEST",
            fx.order.id
        );
        assert!(signature::verify(&EsewaConfig::default().secret_key, &message, &form.signature).is_ok());

        let err = payments.initiate(&fx.order.id, "user-2").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }

    #[tokio::test]
    async fn test_initiate_requires_pending_esewa_order() {
        let fx = setup(PaymentMethod::CashOnDelivery).await;
        let payments = service(&fx.db, MockPaymentGateway::new());
        let err = payments.initiate(&fx.order.id, "user-1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());
        fx.db.orders().cancel(&fx.order.id, "user-1").await.unwrap();
        let err = payments.initiate(&fx.order.id, "user-1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_complete_callback_is_idempotent() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());
        let data = callback(&fx.order.id, "COMPLETE", "39.79");

        let outcome = payments.verify(&data).await.unwrap();
        assert!(outcome.is_applied());
        let order = outcome.order();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.payment_reference.as_deref(), Some("000AWEO"));
        assert!(order.paid_at.is_some());
        assert_eq!(stock(&fx.db, &fx.dune).await, 8);

        let again = payments.verify(&data).await.unwrap();
        assert!(matches!(again, VerificationOutcome::Unchanged { .. }));
        assert_eq!(stock(&fx.db, &fx.dune).await, 8);
    }

    #[tokio::test]
    async fn test_wrong_amount_changes_nothing() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());

        let err = payments
            .verify(&callback(&fx.order.id, "COMPLETE", "1.00"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AmountMismatch);
        assert_eq!(
            err.detail,
            Some(ErrorDetail::Amount {
                expected: Money::from_minor(3979),
                received: Money::from_minor(100),
            })
        );

        let order = reload(&fx.db, &fx.order).await;
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.order_status, OrderStatus::Confirmed);
        assert_eq!(stock(&fx.db, &fx.dune).await, 8);
    }

    #[tokio::test]
    async fn test_tampered_callback_fails_signature() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());

        let genuine = callback(&fx.order.id, "COMPLETE", "39.79");
        let mut body: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(genuine).unwrap()).unwrap();
        body["total_amount"] = json!("0.01");
        let tampered = BASE64.encode(body.to_string());

        let err = payments.verify(&tampered).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureMismatch);

        let err = payments.verify("definitely not base64!").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_failed_callback_cancels_and_restocks() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());

        let mut cart = fx.db.carts().get_or_create("user-1").await.unwrap();
        cart.add_item(&fx.dune, 1).unwrap();
        fx.db.carts().save(&cart).await.unwrap();

        let outcome = payments
            .verify(&callback(&fx.order.id, "CANCELED", "39.79"))
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(outcome.order().payment_status, PaymentStatus::Failed);
        assert_eq!(outcome.order().order_status, OrderStatus::Cancelled);
        assert_eq!(stock(&fx.db, &fx.dune).await, 10);

        let cart = fx.db.carts().get_or_create("user-1").await.unwrap();
        assert_eq!(cart.quantity_of(&fx.dune.id), 1);
    }

    #[tokio::test]
    async fn test_unmapped_status_is_unverified() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());

        let outcome = payments
            .verify(&callback(&fx.order.id, "FULL_REFUND", "39.79"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            VerificationOutcome::Unverified {
                status: GatewayStatus::FullRefund,
                ..
            }
        ));
        assert_eq!(reload(&fx.db, &fx.order).await.payment_status, PaymentStatus::Pending);

        let err = payments
            .verify(&callback("no-such-order", "COMPLETE", "39.79"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }

    #[tokio::test]
    async fn test_check_status_reconciles() {
        let fx = setup(PaymentMethod::Esewa).await;
        let order_id = fx.order.id.clone();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_fetch_status()
            .withf(move |query| {
                query.transaction_uuid == order_id && query.total_amount == Money::from_minor(3979)
            })
            .times(1)
            .returning(|_| {
                Ok(StatusReport {
                    status: GatewayStatus::Complete,
                    ref_id: Some("0001TS9".to_string()),
                    total_amount: Some(Money::from_minor(3979)),
                })
            });
        let payments = service(&fx.db, gateway);

        let outcome = payments.check_status(&fx.order.id).await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(outcome.order().payment_reference.as_deref(), Some("0001TS9"));
    }

    #[tokio::test]
    async fn test_check_status_without_news() {
        let fx = setup(PaymentMethod::Esewa).await;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_status().times(1).returning(|_| {
            Ok(StatusReport {
                status: GatewayStatus::Pending,
                ref_id: None,
                total_amount: None,
            })
        });
        let payments = service(&fx.db, gateway);

        let outcome = payments.check_status(&fx.order.id).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Unchanged { .. }));
    }

    #[tokio::test]
    async fn test_gateway_errors_are_reported() {
        let fx = setup(PaymentMethod::Esewa).await;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_status().returning(|_| {
            Err(PaymentError::UnexpectedResponse("status request failed with 503".to_string()))
        });
        let payments = service(&fx.db, gateway);

        let err = payments.check_status(&fx.order.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentGatewayError);
        assert_eq!(err.http_status(), 502);
    }

    #[tokio::test]
    async fn test_check_status_rejects_a_different_amount() {
        let fx = setup(PaymentMethod::Esewa).await;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_status().returning(|_| {
            Ok(StatusReport {
                status: GatewayStatus::Complete,
                ref_id: Some("0001TS9".to_string()),
                total_amount: Some(Money::from_minor(100)),
            })
        });
        let payments = service(&fx.db, gateway);

        let err = payments.check_status(&fx.order.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AmountMismatch);
        assert_eq!(reload(&fx.db, &fx.order).await.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_initiation_signature_replayed_as_callback() {
        let fx = setup(PaymentMethod::Esewa).await;
        let payments = service(&fx.db, MockPaymentGateway::new());
        let form = payments.initiate(&fx.order.id, "user-1").await.unwrap();

        let forged = [
            json!({
                "status": "COMPLETE",
                "total_amount": form.total_amount,
                "transaction_uuid": form.transaction_uuid,
                "product_code": form.product_code,
                "signature": form.signature,
            }),
            json!({
                "status": "COMPLETE",
                "total_amount": form.total_amount,
                "transaction_uuid": form.transaction_uuid,
                "product_code": form.product_code,
                "signed_field_names": form.signed_field_names,
                "signature": form.signature,
            }),
        ];

        for body in forged {
            let err = payments.verify(&BASE64.encode(body.to_string())).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError);
        }

        let order = reload(&fx.db, &fx.order).await;
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.payment_reference, None);
    }
}
