//! Real-time stock notifications.
//!
//! The server broadcasts two Socket.IO events to every open till:
//!
//! - `stock_updated` with `{ id, stock }` after any stock change
//! - `low_stock_alert` with `{ product_name, stock }` when a product runs low
//!
//! [`PushSubscriber`] owns the websocket and decodes frames with [`codec`];
//! decoded events are handed to a [`PushHandler`], which is all the register
//! sees of the transport. Tests drive handlers directly through [`dispatch`].

pub mod codec;
mod subscriber;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use till_core::{LowStockAlert, StockUpdate};

pub use subscriber::{PushSubscriber, install_crypto_provider};

/// Name of the stock change event.
pub const STOCK_UPDATED: &str = "stock_updated";
/// Name of the low stock event.
pub const LOW_STOCK_ALERT: &str = "low_stock_alert";

/// Errors that can occur on the push channel.
#[derive(Debug, Error)]
pub enum PushError {
    /// Websocket connection or transport failed.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// Push URL could not be built.
    #[error("Invalid push URL: {0}")]
    Url(#[from] url::ParseError),

    /// Session cookie is not a valid header value.
    #[error("Invalid session cookie: {0}")]
    InvalidHeader(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    /// Frame did not follow the Engine.IO / Socket.IO framing.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Frame payload was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server refused the namespace connection.
    #[error("Connection rejected: {0}")]
    ConnectRejected(String),

    /// Server stopped pinging.
    #[error("No ping from server within {0:?}")]
    Timeout(Duration),
}

impl From<tokio_tungstenite::tungstenite::Error> for PushError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    StockUpdated(StockUpdate),
    LowStockAlert(LowStockAlert),
}

impl PushEvent {
    /// Interpret a Socket.IO event.
    ///
    /// Returns `Ok(None)` for events the register does not handle.
    ///
    /// # Errors
    ///
    /// Returns an error if a known event carries a malformed payload.
    pub fn from_event(name: &str, args: Vec<Value>) -> Result<Option<Self>, PushError> {
        let payload = args.into_iter().next().unwrap_or(Value::Null);
        match name {
            STOCK_UPDATED => Ok(Some(Self::StockUpdated(serde_json::from_value(payload)?))),
            LOW_STOCK_ALERT => Ok(Some(Self::LowStockAlert(serde_json::from_value(payload)?))),
            _ => Ok(None),
        }
    }
}

/// Receiver of push notifications.
pub trait PushHandler: Send + Sync {
    /// A product's stock changed.
    fn on_stock_updated(&self, update: StockUpdate);

    /// A product fell below the low-stock threshold.
    fn on_low_stock_alert(&self, alert: LowStockAlert);
}

impl<T: PushHandler + ?Sized> PushHandler for Arc<T> {
    fn on_stock_updated(&self, update: StockUpdate) {
        (**self).on_stock_updated(update);
    }

    fn on_low_stock_alert(&self, alert: LowStockAlert) {
        (**self).on_low_stock_alert(alert);
    }
}

/// Route an event to the matching handler method.
pub fn dispatch<H: PushHandler + ?Sized>(handler: &H, event: PushEvent) {
    match event {
        PushEvent::StockUpdated(update) => handler.on_stock_updated(update),
        PushEvent::LowStockAlert(alert) => handler.on_low_stock_alert(alert),
    }
}
