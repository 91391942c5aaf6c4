//! # Cart Service
//!
//! Loads the stored cart, applies one pure [`Cart`] operation against the
//! live book, and saves the result.
//!
//! ```text
//! add_item(user, book, qty)
//!     │
//!     ├─ validate qty            VALIDATION_ERROR
//!     ├─ load book               BOOK_NOT_FOUND
//!     ├─ Cart::add_item          INSUFFICIENT_STOCK { available }
//!     └─ CartRepository::save
//! ```
//!
//! Cart lines hold no stock. Stock is only taken at checkout.

use serde::Serialize;
use tracing::debug;

use crate::error::ServiceResult;
use bookstore_core::validation::validate_quantity;
use bookstore_core::{Book, Cart, CoreError, OrderCosts, PricePolicy, PricingConfig};
use bookstore_db::Database;

/// A cart with what checking it out would cost right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub cart: Cart,
    pub costs: OrderCosts,
    /// Distinct lines.
    pub item_count: usize,
    pub total_quantity: i64,
}

impl CartSummary {
    fn new(cart: Cart, pricing: &PricingConfig) -> Self {
        CartSummary {
            costs: OrderCosts::preview(&cart, pricing),
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            cart,
        }
    }
}

/// Cart use cases.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
    pricing: PricingConfig,
}

impl CartService {
    pub fn new(db: Database, pricing: PricingConfig) -> Self {
        CartService { db, pricing }
    }

    /// The user's cart; created empty on first access.
    pub async fn get_cart(&self, user_id: &str) -> ServiceResult<Cart> {
        Ok(self.db.carts().get_or_create(user_id).await?)
    }

    pub async fn summary(&self, user_id: &str) -> ServiceResult<CartSummary> {
        let cart = self.get_cart(user_id).await?;
        Ok(CartSummary::new(cart, &self.pricing))
    }

    /// Adds copies of a book, merging into an existing line.
    pub async fn add_item(&self, user_id: &str, book_id: &str, quantity: i64) -> ServiceResult<Cart> {
        debug!(user_id = %user_id, book_id = %book_id, quantity, "Adding to cart");
        validate_quantity(quantity)?;

        let book = self.book(book_id).await?;
        let mut cart = self.get_cart(user_id).await?;
        cart.add_item(&book, quantity)?;

        self.save(cart).await
    }

    /// Sets a line's quantity. `PricePolicy::Refresh` re-captures the price.
    pub async fn update_item(
        &self,
        user_id: &str,
        book_id: &str,
        quantity: i64,
        policy: PricePolicy,
    ) -> ServiceResult<Cart> {
        debug!(user_id = %user_id, book_id = %book_id, quantity, ?policy, "Updating cart line");

        let mut cart = self.get_cart(user_id).await?;
        if !cart.contains(book_id) {
            return Err(CoreError::CartItemNotFound(book_id.to_string()).into());
        }
        validate_quantity(quantity)?;

        let book = self.book(book_id).await?;
        cart.update_item(&book, quantity, policy)?;

        self.save(cart).await
    }

    pub async fn remove_item(&self, user_id: &str, book_id: &str) -> ServiceResult<Cart> {
        let mut cart = self.get_cart(user_id).await?;
        let removed = cart.remove_item(book_id)?;
        debug!(user_id = %user_id, book_id = %removed.book_id, "Removed cart line");

        self.save(cart).await
    }

    /// Empties the cart. Idempotent.
    pub async fn clear(&self, user_id: &str) -> ServiceResult<Cart> {
        Ok(self.db.carts().clear(user_id).await?)
    }

    async fn book(&self, book_id: &str) -> ServiceResult<Book> {
        let book = self
            .db
            .books()
            .get_by_id(book_id)
            .await?
            .ok_or_else(|| CoreError::BookNotFound(book_id.to_string()))?;
        Ok(book)
    }

    async fn save(&self, cart: Cart) -> ServiceResult<Cart> {
        self.db.carts().save(&cart).await?;
        Ok(cart)
    }
}
