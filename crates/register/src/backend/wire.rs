//! JSON bodies exchanged with the sales backend.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use till_core::{CartItem, PaymentMethod, Product, ProductId};

/// Response of `GET /stock/categories/{id}/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductListing {
    pub products: Vec<Product>,
}

/// Body of `POST /sales/add_to_cart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl AddToCartRequest {
    /// Request for a single unit, which is all the register ever asks for.
    #[must_use]
    pub const fn one(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: 1,
        }
    }
}

/// Success flag plus optional message, returned by both cart endpoints.
///
/// Extra fields (the add endpoint echoes the product back) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Acknowledgement {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl Acknowledgement {
    /// Server message, or `fallback` when it sent none.
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Body of `POST /sales/checkout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    #[serde(serialize_with = "serialize_lines")]
    pub cart: Vec<CartItem>,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
}

/// A cart line as the checkout endpoint reads it: the server looks the
/// product up by `id`, so that key is sent next to `product_id`.
#[derive(Serialize)]
struct CheckoutLine<'a> {
    id: ProductId,
    #[serde(flatten)]
    item: &'a CartItem,
}

fn serialize_lines<S: Serializer>(items: &[CartItem], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(items.len()))?;
    for item in items {
        seq.serialize_element(&CheckoutLine {
            id: item.product_id,
            item,
        })?;
    }
    seq.end()
}
