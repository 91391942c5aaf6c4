//! # Order Service
//!
//! Checkout, order history, cancellation and the admin status board.
//!
//! ```text
//!   create_order ──► confirmed ──► processing ──► shipped ──► delivered
//!                        │              │            │
//!                        └──────────────┴────────────┴──► cancelled (restock)
//! ```
//!
//! Every write is one transaction in `OrderRepository`; this layer
//! validates input and scopes reads to the calling user.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::ServiceResult;
use bookstore_core::validation::validate_shipping_address;
use bookstore_core::{
    CoreError, Order, OrderStatus, Page, PageRequest, PaymentMethod, PricingConfig,
    ShippingAddress, ValidationError,
};
use bookstore_db::{Database, NewOrder};

const MAX_NOTES_LEN: usize = 500;

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Order use cases.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    pricing: PricingConfig,
    refund_window_days: i64,
}

impl OrderService {
    pub fn new(db: Database, pricing: PricingConfig, refund_window_days: i64) -> Self {
        OrderService {
            db,
            pricing,
            refund_window_days,
        }
    }

    /// Turns the user's cart into a confirmed order.
    ///
    /// The cart is emptied and stock debited in the same transaction.
    pub async fn create_order(&self, user_id: &str, request: CreateOrderRequest) -> ServiceResult<Order> {
        validate_shipping_address(&request.shipping_address)?;

        let notes = request
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: MAX_NOTES_LEN,
            }
            .into());
        }

        let input = NewOrder {
            user_id: user_id.to_string(),
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            notes,
        };

        let order = self.db.orders().place_order(&input, &self.pricing).await?;
        info!(
            order_number = %order.order_number,
            user_id = %user_id,
            total = %order.costs.total,
            "Checkout complete"
        );
        Ok(order)
    }

    /// One of the user's own orders. Other users' orders are not found.
    pub async fn get_order(&self, order_id: &str, user_id: &str) -> ServiceResult<Order> {
        let order = self
            .db
            .orders()
            .get_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        Ok(order)
    }

    /// The user's orders, newest first.
    pub async fn list_orders(&self, user_id: &str, page: PageRequest) -> ServiceResult<Page<Order>> {
        Ok(self.db.orders().list_for_user(user_id, page).await?)
    }

    /// Every order, newest first, optionally for one status.
    pub async fn list_all_orders(
        &self,
        status: Option<&str>,
        page: PageRequest,
    ) -> ServiceResult<Page<Order>> {
        let status = status.map(str::parse::<OrderStatus>).transpose()?;
        Ok(self.db.orders().list_all(status, page).await?)
    }

    /// Cancels the user's own order and returns its stock.
    pub async fn cancel_order(&self, order_id: &str, user_id: &str) -> ServiceResult<Order> {
        Ok(self.db.orders().cancel(order_id, user_id).await?)
    }

    /// Admin status change. `status` is the lowercase wire form.
    pub async fn update_status(&self, order_id: &str, status: &str) -> ServiceResult<Order> {
        let next: OrderStatus = status.trim().parse()?;
        Ok(self.db.orders().change_status(order_id, None, next).await?)
    }

    /// Delivered, paid and inside the refund window.
    pub async fn is_refund_eligible(&self, order_id: &str, user_id: &str) -> ServiceResult<bool> {
        let order = self.get_order(order_id, user_id).await?;
        Ok(order.is_refund_eligible(Utc::now(), self.refund_window_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use bookstore_core::pricing::OrderCosts;
    use bookstore_core::{Book, Money, NewBook, PaymentStatus};
    use bookstore_db::DbConfig;

    struct Fixture {
        orders: OrderService,
        db: Database,
        dune: Book,
        emma: Book,
    }

    async fn setup() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let insert = |title: &str, price: i64, stock: i64| NewBook {
            title: title.to_string(),
            author: "Author".to_string(),
            isbn: None,
            description: None,
            category: "Fiction".to_string(),
            price: Money::from_minor(price),
            stock,
        };
        let dune = db.books().insert(&insert("Dune", 1000, 10)).await.unwrap();
        let emma = db.books().insert(&insert("Emma", 1500, 4)).await.unwrap();

        Fixture {
            orders: OrderService::new(db.clone(), PricingConfig::default(), 30),
            db,
            dune,
            emma,
        }
    }

    fn request(method: PaymentMethod) -> CreateOrderRequest {
        CreateOrderRequest {
            shipping_address: ShippingAddress {
                full_name: "Sita Sharma".to_string(),
                phone: "+977 9800000000".to_string(),
                address: "Thamel Marg 12".to_string(),
                city: "Kathmandu".to_string(),
                state: "Bagmati".to_string(),
                zip_code: "44600".to_string(),
                country: "Nepal".to_string(),
            },
            payment_method: method,
            notes: Some("  Leave at the door ".to_string()),
        }
    }

    async fn fill_cart(fx: &Fixture) {
        let carts = fx.db.carts();
        let mut cart = carts.get_or_create("user-1").await.unwrap();
        cart.add_item(&fx.dune, 2).unwrap();
        cart.add_item(&fx.emma, 1).unwrap();
        carts.save(&cart).await.unwrap();
    }

    async fn stock(fx: &Fixture, book: &Book) -> i64 {
        fx.db.books().get_by_id(&book.id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_checkout_confirms_and_debits() {
        let fx = setup().await;
        fill_cart(&fx).await;

        let order = fx
            .orders
            .create_order("user-1", request(PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        assert_eq!(order.order_status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.notes.as_deref(), Some("Leave at the door"));
        assert_eq!(
            order.costs,
            OrderCosts::compute(&order.items, &PricingConfig::default())
        );
        assert_eq!(order.costs.total.minor(), 3979);
        assert_eq!(stock(&fx, &fx.dune).await, 8);
        assert_eq!(stock(&fx, &fx.emma).await, 3);
        assert!(fx.db.carts().get_or_create("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_rejections() {
        let fx = setup().await;

        let err = fx
            .orders
            .create_order("user-1", request(PaymentMethod::Card))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyCart);

        fill_cart(&fx).await;
        let mut incomplete = request(PaymentMethod::Card);
        incomplete.shipping_address.city = "   ".to_string();
        let err = fx.orders.create_order("user-1", incomplete).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut chatty = request(PaymentMethod::Card);
        chatty.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        let err = fx.orders.create_order("user-1", chatty).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert_eq!(stock(&fx, &fx.dune).await, 10);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let fx = setup().await;
        fill_cart(&fx).await;
        let order = fx
            .orders
            .create_order("user-1", request(PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        let err = fx.orders.cancel_order(&order.id, "user-2").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);

        let cancelled = fx.orders.cancel_order(&order.id, "user-1").await.unwrap();
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(stock(&fx, &fx.dune).await, 10);
        assert_eq!(stock(&fx, &fx.emma).await, 4);

        let err = fx.orders.cancel_order(&order.id, "user-1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert_eq!(stock(&fx, &fx.dune).await, 10);
    }

    #[tokio::test]
    async fn test_admin_status_updates() {
        let fx = setup().await;
        fill_cart(&fx).await;
        let order = fx
            .orders
            .create_order("user-1", request(PaymentMethod::Card))
            .await
            .unwrap();

        let err = fx.orders.update_status(&order.id, "teleported").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStatus);

        let err = fx.orders.update_status(&order.id, "delivered").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        let err = fx.orders.update_status("missing", "processing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);

        for status in ["processing", "shipped"] {
            fx.orders.update_status(&order.id, status).await.unwrap();
        }
        assert!(!fx.orders.is_refund_eligible(&order.id, "user-1").await.unwrap());

        let delivered = fx.orders.update_status(&order.id, "delivered").await.unwrap();
        assert!(delivered.delivered_at.is_some());
        assert!(fx.orders.is_refund_eligible(&order.id, "user-1").await.unwrap());

        let err = fx.orders.update_status(&order.id, "cancelled").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_admin_cancel_restocks() {
        let fx = setup().await;
        fill_cart(&fx).await;
        let order = fx
            .orders
            .create_order("user-1", request(PaymentMethod::Card))
            .await
            .unwrap();

        fx.orders.update_status(&order.id, "processing").await.unwrap();
        fx.orders.update_status(&order.id, "cancelled").await.unwrap();
        assert_eq!(stock(&fx, &fx.dune).await, 10);
    }

    #[tokio::test]
    async fn test_history_is_owner_scoped() {
        let fx = setup().await;
        fill_cart(&fx).await;
        let order = fx
            .orders
            .create_order("user-1", request(PaymentMethod::Card))
            .await
            .unwrap();

        assert_eq!(fx.orders.get_order(&order.id, "user-1").await.unwrap().id, order.id);
        assert_eq!(
            fx.orders.get_order(&order.id, "user-2").await.unwrap_err().code,
            ErrorCode::OrderNotFound
        );

        let mine = fx.orders.list_orders("user-1", PageRequest::default()).await.unwrap();
        assert_eq!(mine.pagination.total_items, 1);
        let theirs = fx.orders.list_orders("user-2", PageRequest::default()).await.unwrap();
        assert!(theirs.items.is_empty());

        let confirmed = fx
            .orders
            .list_all_orders(Some("confirmed"), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(confirmed.items.len(), 1);
        let err = fx
            .orders
            .list_all_orders(Some("lost"), PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStatus);
    }
}
