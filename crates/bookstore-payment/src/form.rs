//! # Payment Initiation Form
//!
//! The storefront posts these fields to `form_url`. The order id doubles as
//! `transaction_uuid`, which is how callbacks find their order.

use serde::{Deserialize, Serialize};

use crate::config::EsewaConfig;
use crate::error::PaymentResult;
use crate::signature::{self, INITIATION_SIGNED_FIELDS};
use bookstore_core::{Money, Order};

/// Signed eSewa ePay v2 form fields.
///
/// `amount + tax_amount + product_service_charge + product_delivery_charge`
/// always equals `total_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentForm {
    /// Where to post the form.
    pub action: String,
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

impl PaymentForm {
    /// Builds and signs the form for `order`.
    pub fn for_order(order: &Order, config: &EsewaConfig) -> PaymentResult<Self> {
        let total_amount = order.costs.total.to_decimal_string();
        let message = signature::signing_message([
            ("total_amount", total_amount.as_str()),
            ("transaction_uuid", order.id.as_str()),
            ("product_code", config.merchant_code.as_str()),
        ]);

        Ok(PaymentForm {
            action: config.form_url.clone(),
            amount: order.costs.subtotal.to_decimal_string(),
            tax_amount: order.costs.tax.to_decimal_string(),
            total_amount,
            transaction_uuid: order.id.clone(),
            product_code: config.merchant_code.clone(),
            product_service_charge: Money::zero().to_decimal_string(),
            product_delivery_charge: order.costs.shipping_cost.to_decimal_string(),
            success_url: config.success_url.clone(),
            failure_url: config.failure_url.clone(),
            signed_field_names: INITIATION_SIGNED_FIELDS.to_string(),
            signature: signature::sign(&config.secret_key, &message)?,
        })
    }

    /// Form fields in post order, without `action`.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("amount", self.amount.as_str()),
            ("tax_amount", self.tax_amount.as_str()),
            ("total_amount", self.total_amount.as_str()),
            ("transaction_uuid", self.transaction_uuid.as_str()),
            ("product_code", self.product_code.as_str()),
            ("product_service_charge", self.product_service_charge.as_str()),
            ("product_delivery_charge", self.product_delivery_charge.as_str()),
            ("success_url", self.success_url.as_str()),
            ("failure_url", self.failure_url.as_str()),
            ("signed_field_names", self.signed_field_names.as_str()),
            ("signature", self.signature.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::{
        OrderCosts, OrderLineItem, OrderStatus, PaymentMethod, PaymentStatus, PricingConfig,
        ShippingAddress,
    };
    use chrono::Utc;

    fn order() -> Order {
        let items = vec![
            OrderLineItem::new("b1", "Dune", "Frank Herbert", 2, Money::from_minor(1000)),
            OrderLineItem::new("b2", "Emma", "Jane Austen", 1, Money::from_minor(1500)),
        ];
        let now = Utc::now();
        Order {
            id: "order-1".to_string(),
            user_id: "user-1".to_string(),
            order_number: "ORD-TEST-00001".to_string(),
            costs: OrderCosts::compute(&items, &PricingConfig::default()),
            items,
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::Esewa,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Confirmed,
            notes: None,
            payment_reference: None,
            stock_reserved: true,
            paid_at: None,
            cancelled_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_form_fields_and_signature() {
        let form = PaymentForm::for_order(&order(), &EsewaConfig::default()).unwrap();

        assert_eq!(form.amount, "35.00");
        assert_eq!(form.tax_amount, "2.80");
        assert_eq!(form.product_delivery_charge, "1.99");
        assert_eq!(form.product_service_charge, "0.00");
        assert_eq!(form.total_amount, "39.79");
        assert_eq!(form.transaction_uuid, "order-1");
        assert_eq!(form.product_code, "EPAYTEST");
        assert_eq!(form.signed_field_names, "total_amount,transaction_uuid,product_code");

        let message = "total_amount=39.79,transaction_uuid=order-1,product_code=EPAYTEST";
        assert!(signature::verify(&EsewaConfig::default().secret_key, message, &form.signature).is_ok());
    }

    #[test]
    fn test_components_add_up_to_total() {
        let form = PaymentForm::for_order(&order(), &EsewaConfig::default()).unwrap();
        let parts: Money = [
            &form.amount,
            &form.tax_amount,
            &form.product_service_charge,
            &form.product_delivery_charge,
        ]
        .iter()
        .map(|text| Money::parse_decimal(text).unwrap())
        .sum();

        assert_eq!(parts, Money::parse_decimal(&form.total_amount).unwrap());
        assert_eq!(form.fields().len(), 11);
    }
}
