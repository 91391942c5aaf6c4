//! # Order Cost Calculator
//!
//! Pure derivation of order costs from a fixed snapshot of line items.
//!
//! ## Calculation Order
//! ```text
//! items ──► subtotal = Σ item.subtotal
//!              │
//!              ├──► tax = round_half_up(subtotal × rate)
//!              │
//!              ├──► shipping = 0 if subtotal ≥ threshold, else flat fee
//!              │
//!              ▼
//!           total = subtotal + tax + shipping
//! ```
//!
//! Tax is computed on the subtotal only; shipping is never taxed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::money::Money;
use crate::types::{OrderLineItem, TaxRate};

/// Default tax rate: 8%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 800;

/// Default free-shipping threshold: 50.00.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Money = Money::from_minor(5000);

/// Default flat shipping fee: 1.99.
pub const DEFAULT_FLAT_SHIPPING_FEE: Money = Money::from_minor(199);

// =============================================================================
// Pricing Config
// =============================================================================

/// Store-wide pricing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub tax_rate: TaxRate,
    /// Subtotals at or above this ship free.
    pub free_shipping_threshold: Money,
    pub flat_shipping_fee: Money,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            tax_rate: TaxRate::from_bps(DEFAULT_TAX_RATE_BPS),
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
            flat_shipping_fee: DEFAULT_FLAT_SHIPPING_FEE,
        }
    }
}

impl PricingConfig {
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping_fee
        }
    }
}

// =============================================================================
// Order Costs
// =============================================================================

/// Cost breakdown stored on every order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderCosts {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
}

impl OrderCosts {
    /// Computes costs for an immutable item snapshot.
    pub fn compute(items: &[OrderLineItem], config: &PricingConfig) -> Self {
        let subtotal: Money = items.iter().map(|item| item.subtotal).sum();
        Self::compute_from_subtotal(subtotal, config)
    }

    pub fn compute_from_subtotal(subtotal: Money, config: &PricingConfig) -> Self {
        let tax = subtotal.calculate_tax(config.tax_rate);
        let shipping_cost = config.shipping_for(subtotal);

        OrderCosts {
            subtotal,
            tax,
            shipping_cost,
            total: subtotal + tax + shipping_cost,
        }
    }

    /// Computes costs unless `existing` already carries them.
    ///
    /// An order is priced exactly once; re-saving it must not re-price it
    /// against a config that may have changed since.
    pub fn compute_once(existing: &OrderCosts, items: &[OrderLineItem], config: &PricingConfig) -> Self {
        if existing.subtotal.is_zero() {
            Self::compute(items, config)
        } else {
            *existing
        }
    }

    /// What checking out `cart` right now would cost.
    pub fn preview(cart: &Cart, config: &PricingConfig) -> Self {
        Self::compute_from_subtotal(cart.total, config)
    }

    /// total == subtotal + tax + shipping_cost, and nothing negative.
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.tax + self.shipping_cost
            && !self.subtotal.is_negative()
            && !self.tax.is_negative()
            && !self.shipping_cost.is_negative()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
