//! # Order Lifecycle
//!
//! Closed status enums, their transition tables, and pure planning
//! functions that decide what a status change or a payment outcome does to
//! an order. Repositories persist the resulting plans.
//!
//! ## Order Status Flow
//! ```text
//!   ┌─────────┐    ┌───────────┐    ┌────────────┐    ┌─────────┐    ┌───────────┐
//!   │ pending │───►│ confirmed │───►│ processing │───►│ shipped │───►│ delivered │
//!   └────┬────┘    └─────┬─────┘    └─────┬──────┘    └────┬────┘    └───────────┘
//!        │               │                │                │           (terminal)
//!        └───────────────┴───────┬────────┴────────────────┘
//!                                ▼
//!                         ┌───────────┐
//!                         │ cancelled │ (terminal, stock credited back)
//!                         └───────────┘
//! ```
//!
//! ## Payment Status Flow
//! ```text
//!   pending ──► completed ──► refunded
//!      │
//!      └──────► failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::Order;

/// Days after ordering during which a delivered, paid order can be refunded.
pub const REFUND_WINDOW_DAYS: i64 = 30;

// =============================================================================
// Order Status
// =============================================================================

/// Fulfillment status of an order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Statuses this status may move to.
    pub const fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Fails with `InvalidOrderTransition` when the table forbids `next`.
    pub fn ensure_transition(&self, next: OrderStatus) -> CoreResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidOrderTransition {
                from: *self,
                to: next,
            })
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    /// Parses the lowercase wire form. Anything else is `InvalidStatus`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Settlement status of an order's payment.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const fn allowed_transitions(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[Completed, Failed],
            Completed => &[Refunded],
            Failed | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn ensure_transition(&self, next: PaymentStatus) -> CoreResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidPaymentTransition {
                from: *self,
                to: next,
            })
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Status Change Planning
// =============================================================================

/// What an order status change writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Credit every line's quantity back to stock.
    pub release_stock: bool,
}

/// Plans a move of `order` to `next`.
///
/// ## Rules
/// - The order status table decides whether the move is legal
/// - `delivered` stamps `delivered_at`
/// - `cancelled` stamps `cancelled_at` and releases a held reservation
pub fn plan_status_change(
    order: &Order,
    next: OrderStatus,
    now: DateTime<Utc>,
) -> CoreResult<StatusChange> {
    order.order_status.ensure_transition(next)?;

    Ok(StatusChange {
        status: next,
        delivered_at: (next == OrderStatus::Delivered).then_some(now),
        cancelled_at: (next == OrderStatus::Cancelled).then_some(now),
        release_stock: next == OrderStatus::Cancelled && order.stock_reserved,
    })
}

/// Mapped result of a gateway report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed { reference: String },
    Pending,
    Failed,
}

/// What a payment outcome writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransition {
    /// Nothing to persist.
    NoChange,
    Complete {
        reference: String,
        /// The order holds no stock debit yet; take it now and clear the cart.
        reserve_stock: bool,
        /// Move a still-pending order to confirmed.
        advance_to_confirmed: bool,
    },
    /// Releasing the reservation compensates for the stock debit taken at
    /// checkout; the cart was already cleared then and stays as it is.
    Fail {
        /// Cancel the order as well. False when it is already cancelled.
        cancel_order: bool,
        release_stock: bool,
    },
}

/// Plans the effect of a gateway outcome on `order`.
///
/// Repeated reports of the state the order is already in are `NoChange`,
/// which makes duplicate callbacks harmless.
pub fn plan_payment(order: &Order, outcome: PaymentOutcome) -> CoreResult<PaymentTransition> {
    match outcome {
        PaymentOutcome::Pending => Ok(PaymentTransition::NoChange),

        PaymentOutcome::Completed { reference } => {
            if order.payment_status == PaymentStatus::Completed {
                return Ok(PaymentTransition::NoChange);
            }
            order.payment_status.ensure_transition(PaymentStatus::Completed)?;
            if order.order_status == OrderStatus::Cancelled {
                return Err(CoreError::InvalidOrderTransition {
                    from: OrderStatus::Cancelled,
                    to: OrderStatus::Confirmed,
                });
            }

            Ok(PaymentTransition::Complete {
                reference,
                reserve_stock: !order.stock_reserved,
                advance_to_confirmed: order.order_status == OrderStatus::Pending,
            })
        }

        PaymentOutcome::Failed => {
            if order.payment_status == PaymentStatus::Failed {
                return Ok(PaymentTransition::NoChange);
            }
            order.payment_status.ensure_transition(PaymentStatus::Failed)?;

            let cancel_order = order.order_status != OrderStatus::Cancelled;
            if cancel_order {
                order.order_status.ensure_transition(OrderStatus::Cancelled)?;
            }

            Ok(PaymentTransition::Fail {
                cancel_order,
                release_stock: order.stock_reserved,
            })
        }
    }
}

// =============================================================================
// Derived Order State
// =============================================================================

impl Order {
    /// Delivered.
    pub fn is_completed(&self) -> bool {
        self.order_status == OrderStatus::Delivered
    }

    /// Neither delivered nor cancelled.
    pub fn is_active(&self) -> bool {
        !self.order_status.is_terminal()
    }

    /// Whole days elapsed since the order was placed.
    pub fn days_since_order(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    pub fn can_cancel(&self) -> bool {
        self.order_status.can_transition_to(OrderStatus::Cancelled)
    }

    /// Delivered, paid and still inside the refund window.
    pub fn is_refund_eligible(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        self.is_completed()
            && self.payment_status == PaymentStatus::Completed
            && now - self.created_at <= chrono::Duration::days(window_days)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::pricing::OrderCosts;
    use crate::types::{OrderLineItem, PaymentMethod, ShippingAddress};
    use chrono::Duration;

    fn order(status: OrderStatus, payment: PaymentStatus, reserved: bool) -> Order {
        let now = Utc::now();
        Order {
            id: "order-1".to_string(),
            user_id: "user-1".to_string(),
            order_number: "ORD-TEST-00001".to_string(),
            items: vec![OrderLineItem::new("b1", "Dune", "Frank Herbert", 1, Money::from_minor(1000))],
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::Esewa,
            payment_status: payment,
            order_status: status,
            costs: OrderCosts::default(),
            notes: None,
            payment_reference: None,
            stock_reserved: reserved,
            paid_at: None,
            cancelled_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_order_transition_table() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Shipped.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Processing.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));

        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_payment_transition_table() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Refunded.can_transition_to(Pending));
    }

    #[test]
    fn test_wire_form_is_snake_case() {
        assert_eq!(serde_json::to_string(&OrderStatus::Shipped).unwrap(), "\"shipped\"");
        let parsed: PaymentStatus = serde_json::from_str("\"refunded\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Refunded);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!(matches!(
            "lost".parse::<OrderStatus>(),
            Err(CoreError::InvalidStatus(s)) if s == "lost"
        ));
    }

    #[test]
    fn test_cancel_plan_releases_reserved_stock() {
        let now = Utc::now();
        let plan = plan_status_change(
            &order(OrderStatus::Confirmed, PaymentStatus::Pending, true),
            OrderStatus::Cancelled,
            now,
        )
        .unwrap();

        assert_eq!(plan.status, OrderStatus::Cancelled);
        assert_eq!(plan.cancelled_at, Some(now));
        assert!(plan.release_stock);
        assert!(plan.delivered_at.is_none());
    }

    #[test]
    fn test_cancel_delivered_is_rejected() {
        let result = plan_status_change(
            &order(OrderStatus::Delivered, PaymentStatus::Completed, false),
            OrderStatus::Cancelled,
            Utc::now(),
        );
        assert!(matches!(result, Err(CoreError::InvalidOrderTransition { .. })));
    }

    #[test]
    fn test_delivery_stamps_delivered_at() {
        let now = Utc::now();
        let plan = plan_status_change(
            &order(OrderStatus::Shipped, PaymentStatus::Completed, true),
            OrderStatus::Delivered,
            now,
        )
        .unwrap();
        assert_eq!(plan.delivered_at, Some(now));
        assert!(!plan.release_stock);
    }

    #[test]
    fn test_duplicate_completion_is_no_change() {
        let paid = order(OrderStatus::Confirmed, PaymentStatus::Completed, true);
        let plan = plan_payment(
            &paid,
            PaymentOutcome::Completed {
                reference: "TX-1".to_string(),
            },
        )
        .unwrap();
        assert_eq!(plan, PaymentTransition::NoChange);
    }

    #[test]
    fn test_completion_reserves_only_when_not_held() {
        let outcome = || PaymentOutcome::Completed {
            reference: "TX-1".to_string(),
        };

        let held = plan_payment(&order(OrderStatus::Confirmed, PaymentStatus::Pending, true), outcome()).unwrap();
        assert!(matches!(held, PaymentTransition::Complete { reserve_stock: false, .. }));

        let released = plan_payment(&order(OrderStatus::Pending, PaymentStatus::Pending, false), outcome()).unwrap();
        assert!(matches!(
            released,
            PaymentTransition::Complete {
                reserve_stock: true,
                advance_to_confirmed: true,
                ..
            }
        ));
    }

    #[test]
    fn test_completion_of_cancelled_order_is_rejected() {
        let result = plan_payment(
            &order(OrderStatus::Cancelled, PaymentStatus::Pending, false),
            PaymentOutcome::Completed {
                reference: "TX-1".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_cancels_and_releases() {
        let plan = plan_payment(
            &order(OrderStatus::Confirmed, PaymentStatus::Pending, true),
            PaymentOutcome::Failed,
        )
        .unwrap();
        assert_eq!(
            plan,
            PaymentTransition::Fail {
                cancel_order: true,
                release_stock: true
            }
        );

        let again = plan_payment(
            &order(OrderStatus::Cancelled, PaymentStatus::Failed, false),
            PaymentOutcome::Failed,
        )
        .unwrap();
        assert_eq!(again, PaymentTransition::NoChange);
    }

    #[test]
    fn test_refund_window() {
        let now = Utc::now();
        let mut delivered = order(OrderStatus::Delivered, PaymentStatus::Completed, false);

        delivered.created_at = now - Duration::days(REFUND_WINDOW_DAYS);
        assert!(delivered.is_refund_eligible(now, REFUND_WINDOW_DAYS));

        delivered.created_at = now - Duration::days(REFUND_WINDOW_DAYS + 1);
        assert!(!delivered.is_refund_eligible(now, REFUND_WINDOW_DAYS));
        assert_eq!(delivered.days_since_order(now), REFUND_WINDOW_DAYS + 1);

        let unpaid = order(OrderStatus::Delivered, PaymentStatus::Pending, false);
        assert!(!unpaid.is_refund_eligible(now, REFUND_WINDOW_DAYS));
    }

    #[test]
    fn test_derived_flags() {
        let active = order(OrderStatus::Processing, PaymentStatus::Pending, true);
        assert!(active.is_active());
        assert!(active.can_cancel());
        assert!(!active.is_completed());

        let done = order(OrderStatus::Delivered, PaymentStatus::Completed, false);
        assert!(done.is_completed());
        assert!(!done.is_active());
        assert!(!done.can_cancel());
    }
}
