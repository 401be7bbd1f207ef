//! Cart & catalog controller.
//!
//! [`Register`] owns the session state (cart, rendered screen, last viewed
//! category) and exposes it only through the operations below. It talks to the
//! server through a [`SalesBackend`] and to the cashier through a [`Host`].
//!
//! # Concurrency
//!
//! State sits behind a mutex that is never held across an `.await`. Network
//! calls therefore interleave freely: two quick adds of the same product are
//! both in flight and each applies its own acknowledgement when it lands, a
//! stale catalog response overwrites a newer push update, and nothing is ever
//! cancelled. Push events take the same lock from the subscriber task.
//!
//! [`Host::redraw`] is called after the lock is released, with a snapshot of
//! the screen. Redraws from the push task and from the caller can therefore
//! reach the host in a different order than the state changes they follow;
//! the last redraw may show an older snapshot than [`Register::screen`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use till_core::{Cart, CategoryId, LowStockAlert, PaymentMethod, Price, ProductId, StockUpdate};
use tracing::{debug, info, instrument};

use crate::backend::{AddToCartRequest, BackendError, CheckoutRequest, SalesBackend};
use crate::push::PushHandler;
use crate::view::{self, Region, Screen};

/// Shown when checkout is attempted with nothing in the cart.
pub const EMPTY_CART_MESSAGE: &str = "Your cart is empty!";
/// Shown when the server refuses an add without saying why.
pub const ADD_REJECTED_FALLBACK: &str = "Could not add item to cart";
/// Shown when the server accepts a sale without a message.
pub const CHECKOUT_COMPLETED_FALLBACK: &str = "Sale completed";
/// Shown when the server refuses a sale without saying why.
pub const CHECKOUT_REJECTED_FALLBACK: &str = "Checkout failed";

/// The cashier-facing side of the register.
pub trait Host: Send + Sync {
    /// Show a message the cashier has to acknowledge.
    fn alert(&self, message: &str);

    /// Throw away session state and resynchronise with the server.
    ///
    /// Called after a completed sale; the front-end answers by calling
    /// [`Register::reload`] once it is ready.
    fn request_reload(&self);

    /// A region of the screen changed.
    fn redraw(&self, _region: Region, _screen: &Screen) {}
}

/// Result of [`Register::add_to_cart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Server accepted; the line now holds `quantity` units.
    Added { quantity: u32 },
    /// Server refused with this message; the cart is unchanged.
    Rejected(String),
    /// Request never got an answer; logged only.
    Failed,
}

/// Result of [`Register::checkout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Nothing to sell; no request was sent.
    EmptyCart,
    /// Sale recorded; the cart was cleared and a reload requested.
    Completed(String),
    /// Server refused with this message; the cart is unchanged.
    Rejected(String),
    /// Request never got an answer; logged only.
    Failed,
}

#[derive(Default)]
struct State {
    cart: Cart,
    screen: Screen,
    category: Option<CategoryId>,
}

/// Session controller for one till.
pub struct Register<B, H> {
    backend: B,
    host: H,
    state: Mutex<State>,
}

impl<B: SalesBackend, H: Host> Register<B, H> {
    /// Create a register with an empty cart and nothing on screen.
    #[must_use]
    pub fn new(backend: B, host: H) -> Self {
        Self {
            backend,
            host,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of everything on screen.
    #[must_use]
    pub fn screen(&self) -> Screen {
        self.state().screen.clone()
    }

    /// Snapshot of the cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.state().cart.clone()
    }

    /// Category whose listing is on screen.
    #[must_use]
    pub fn category(&self) -> Option<CategoryId> {
        self.state().category
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Replace the product list with the products of one category.
    ///
    /// On failure the current list stays on screen and stays the category
    /// [`reload`](Self::reload) returns to.
    ///
    /// # Errors
    ///
    /// Returns the backend error after logging it.
    #[instrument(skip(self))]
    pub async fn filter_category(&self, category: CategoryId) -> Result<(), BackendError> {
        let products = match self.backend.list_products(category).await {
            Ok(products) => products,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load category");
                return Err(e);
            }
        };

        let screen = {
            let mut state = self.state();
            state.screen.product_list = view::render_products(&products);
            state.category = Some(category);
            state.screen.clone()
        };
        debug!(count = products.len(), "Product list rendered");
        self.host.redraw(Region::ProductList, &screen);
        Ok(())
    }

    /// Add one unit of a product, once the server has agreed to it.
    #[instrument(skip(self, product_name, price))]
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        product_name: &str,
        price: Price,
    ) -> AddOutcome {
        let ack = match self
            .backend
            .add_to_cart(AddToCartRequest::one(product_id))
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!(error = %e, "Add to cart request failed");
                return AddOutcome::Failed;
            }
        };

        if !ack.success {
            let message = ack.message_or(ADD_REJECTED_FALLBACK);
            info!(%message, "Add to cart rejected");
            self.host.alert(&message);
            return AddOutcome::Rejected(message);
        }

        let (quantity, screen) = {
            let mut state = self.state();
            state.cart.add_unit(product_id, product_name, price);
            let quantity = state.cart.get(product_id).map_or(1, |item| item.quantity);
            state.screen.cart = view::render_cart(&state.cart);
            (quantity, state.screen.clone())
        };
        self.host.redraw(Region::Cart, &screen);
        AddOutcome::Added { quantity }
    }

    /// Select how the sale will be paid.
    pub fn select_payment_method(&self, payment_method: PaymentMethod) {
        let screen = {
            let mut state = self.state();
            let name = std::mem::take(&mut state.screen.payment.customer_name);
            state.screen.payment = view::render_payment(payment_method, &name);
            state.screen.clone()
        };
        self.host.redraw(Region::PaymentControls, &screen);
    }

    /// Type into the customer-name field.
    pub fn set_customer_name(&self, customer_name: &str) {
        let screen = {
            let mut state = self.state();
            let payment_method = state.screen.payment.payment_method;
            state.screen.payment = view::render_payment(payment_method, customer_name);
            state.screen.clone()
        };
        self.host.redraw(Region::PaymentControls, &screen);
    }

    /// Submit the cart as one sale.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> CheckoutOutcome {
        let request = {
            let state = self.state();
            (!state.cart.is_empty()).then(|| {
                let payment = &state.screen.payment;
                CheckoutRequest {
                    cart: state.cart.items().to_vec(),
                    payment_method: payment.payment_method,
                    customer_name: Some(payment.customer_name.trim().to_string())
                        .filter(|name| !name.is_empty()),
                }
            })
        };

        let Some(request) = request else {
            self.host.alert(EMPTY_CART_MESSAGE);
            return CheckoutOutcome::EmptyCart;
        };

        let ack = match self.backend.checkout(request).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!(error = %e, "Checkout request failed");
                return CheckoutOutcome::Failed;
            }
        };

        if !ack.success {
            let message = ack.message_or(CHECKOUT_REJECTED_FALLBACK);
            info!(%message, "Checkout rejected");
            self.host.alert(&message);
            return CheckoutOutcome::Rejected(message);
        }

        let message = ack.message_or(CHECKOUT_COMPLETED_FALLBACK);
        info!(%message, "Sale completed");
        self.host.alert(&message);

        let screen = {
            let mut state = self.state();
            state.cart.clear();
            state.screen.cart = view::render_cart(&state.cart);
            state.screen.clone()
        };
        self.host.redraw(Region::Cart, &screen);
        self.host.request_reload();
        CheckoutOutcome::Completed(message)
    }

    /// Start the session over: empty cart, default payment controls, and a
    /// fresh listing of the last viewed category.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the category cannot be re-fetched.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<(), BackendError> {
        let (category, screen) = {
            let mut state = self.state();
            state.cart.clear();
            state.screen = Screen::default();
            (state.category, state.screen.clone())
        };
        for region in [Region::ProductList, Region::Cart, Region::PaymentControls] {
            self.host.redraw(region, &screen);
        }

        match category {
            Some(category) => self.filter_category(category).await,
            None => Ok(()),
        }
    }
}

impl<B: SalesBackend, H: Host> PushHandler for Register<B, H> {
    fn on_stock_updated(&self, update: StockUpdate) {
        let screen = {
            let mut state = self.state();
            let Some(entry) = state.screen.product_mut(update.id) else {
                debug!(product_id = %update.id, "Stock update for product not on screen");
                return;
            };
            entry.patch_stock(update.stock);
            state.screen.clone()
        };
        debug!(product_id = %update.id, stock = update.stock, "Stock patched");
        self.host.redraw(Region::ProductList, &screen);
    }

    fn on_low_stock_alert(&self, alert: LowStockAlert) {
        self.host.alert(&alert.message());
    }
}
