//! Payloads pushed by the server over the real-time channel.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// `stock_updated`: a product's remaining stock changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub id: ProductId,
    pub stock: i32,
    /// Sent by some server versions; not needed to patch the display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `low_stock_alert`: a product dropped below the server's threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_name: String,
    pub stock: i32,
}

impl LowStockAlert {
    /// Text shown to the cashier.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Low stock alert for {}: Only {} left!",
            self.product_name, self.stock
        )
    }
}
