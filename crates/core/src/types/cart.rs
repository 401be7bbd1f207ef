//! The in-progress sale.
//!
//! A [`Cart`] holds at most one [`CartItem`] per product, in the order the
//! products were first added. Line totals are maintained incrementally: each
//! added unit adds the unit price it was added at, so a line stays consistent
//! with what the cashier saw even if the catalog price changes mid-sale.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    /// Always at least 1.
    pub quantity: u32,
    /// Unit price at the time the line was created.
    pub price: Price,
    pub total_price: Price,
}

impl CartItem {
    fn new(product_id: ProductId, product_name: String, price: Price) -> Self {
        Self {
            product_id,
            product_name,
            quantity: 1,
            price,
            total_price: price,
        }
    }
}

/// Ordered collection of cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record one more unit of a product.
    ///
    /// Increments the existing line for `product_id`, or appends a new line
    /// with quantity 1.
    pub fn add_unit(&mut self, product_id: ProductId, product_name: impl Into<String>, price: Price) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity += 1;
            item.total_price += price;
        } else {
            self.items
                .push(CartItem::new(product_id, product_name.into(), price));
        }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Line for a product, if it is in the cart.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(|i| i.total_price).sum()
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
