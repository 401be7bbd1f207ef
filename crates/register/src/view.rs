//! Declarative view of the register screen.
//!
//! Every visible piece of state is a plain value computed from the model by a
//! pure function, so rendering the same model twice always yields equal views.
//! Front-ends draw a [`Screen`]; they never compute labels or totals themselves.
//!
//! Element names follow the sales page: `product_list` holds one
//! `product-{id}` entry per product, `cart_list` and `total_price` show the
//! cart, and `customer_name_div` wraps the `customer_name` field that only
//! credit sales show.

use till_core::{Cart, CartItem, PaymentMethod, Price, Product, ProductId};

/// Screen regions, named after the page elements they replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    ProductList,
    Cart,
    PaymentControls,
}

impl Region {
    /// Id of the page element the region stands for.
    #[must_use]
    pub const fn element_id(self) -> &'static str {
        match self {
            Self::ProductList => "product_list",
            Self::Cart => "cart_list",
            Self::PaymentControls => "payment_method",
        }
    }
}

/// One product in the catalog list, with its add action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductEntry {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub stock: i32,
    /// `<name> - Ksh <price> (<stock> left)`
    pub label: String,
    pub add_enabled: bool,
}

impl ProductEntry {
    /// Element id of the entry, `product-{id}`.
    #[must_use]
    pub fn element_id(&self) -> String {
        format!("product-{}", self.product_id)
    }

    /// Replace the displayed stock, leaving name and price untouched.
    pub fn patch_stock(&mut self, stock: i32) {
        self.stock = stock;
        self.label = product_label(&self.name, self.price, stock);
        self.add_enabled = stock > 0;
    }
}

/// One cart line as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub quantity: u32,
    pub line_total: Price,
    /// `<name> - Quantity: <q> - Price: Ksh <line total>`
    pub text: String,
}

/// The cart list plus the grand total under it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total_price: Price,
}

/// Payment selector and the customer-name field it controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentView {
    pub payment_method: PaymentMethod,
    pub customer_name_visible: bool,
    /// Kept while hidden, so switching back to credit restores it.
    pub customer_name: String,
}

/// Everything the cashier sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    pub product_list: Vec<ProductEntry>,
    pub cart: CartView,
    pub payment: PaymentView,
}

impl Screen {
    /// Rendered entry for a product, if its category is on screen.
    #[must_use]
    pub fn product(&self, product_id: ProductId) -> Option<&ProductEntry> {
        self.product_list
            .iter()
            .find(|e| e.product_id == product_id)
    }

    /// Mutable access to a rendered entry.
    pub fn product_mut(&mut self, product_id: ProductId) -> Option<&mut ProductEntry> {
        self.product_list
            .iter_mut()
            .find(|e| e.product_id == product_id)
    }
}

/// Catalog label for a product.
#[must_use]
pub fn product_label(name: &str, price: Price, stock: i32) -> String {
    format!("{name} - {price} ({stock} left)")
}

/// Render a category listing.
#[must_use]
pub fn render_products(products: &[Product]) -> Vec<ProductEntry> {
    products
        .iter()
        .map(|p| ProductEntry {
            product_id: p.id,
            name: p.name.clone(),
            price: p.price,
            stock: p.stock,
            label: product_label(&p.name, p.price, p.stock),
            add_enabled: p.in_stock(),
        })
        .collect()
}

fn render_line(item: &CartItem) -> CartLineView {
    CartLineView {
        product_id: item.product_id,
        quantity: item.quantity,
        line_total: item.total_price,
        text: format!(
            "{} - Quantity: {} - Price: {}",
            item.product_name, item.quantity, item.total_price
        ),
    }
}

/// Render the cart and its grand total.
#[must_use]
pub fn render_cart(cart: &Cart) -> CartView {
    let lines: Vec<CartLineView> = cart.items().iter().map(render_line).collect();
    let total_price = lines.iter().map(|l| l.line_total).sum();
    CartView { lines, total_price }
}

/// Render the payment controls for a selected method.
#[must_use]
pub fn render_payment(payment_method: PaymentMethod, customer_name: &str) -> PaymentView {
    PaymentView {
        payment_method,
        customer_name_visible: payment_method.requires_customer_name(),
        customer_name: customer_name.to_string(),
    }
}
