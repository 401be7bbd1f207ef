//! Catalog products as the backend lists them.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product row from a category listing.
///
/// Display-only: products are never cached beyond the list currently shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Units remaining. Zero or negative means sold out.
    pub stock: i32,
}

impl Product {
    /// Whether at least one unit can still be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
