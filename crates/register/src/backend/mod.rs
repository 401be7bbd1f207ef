//! Sales backend client.
//!
//! # Architecture
//!
//! - [`SalesBackend`] is the seam between the register and the server: the
//!   live implementation is [`HttpBackend`], tests substitute fakes
//! - The backend answers business failures with `{"success": false, "message": ...}`,
//!   often under a 4xx status; those are [`Acknowledgement`]s, not errors
//! - [`BackendError`] covers transport failures only: connection problems,
//!   rate limiting, unexpected statuses and unparseable bodies
//!
//! # Endpoints
//!
//! - `GET /stock/categories/{id}/products`
//! - `POST /sales/add_to_cart`
//! - `POST /sales/checkout`

mod http;
pub mod wire;

use std::future::Future;

use thiserror::Error;
use till_core::{CategoryId, Product};

pub use http::HttpBackend;
pub use wire::{Acknowledgement, AddToCartRequest, CheckoutRequest, ProductListing};

/// Errors that can occur when talking to the sales backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status and no acknowledgement body.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// First part of the response body.
        body: String,
    },

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    /// Session cookie is not a valid header value.
    #[error("Invalid session cookie: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Operations the register needs from the server.
pub trait SalesBackend: Send + Sync {
    /// List every product in a category.
    fn list_products(
        &self,
        category: CategoryId,
    ) -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// Ask the server to reserve units for the cart.
    fn add_to_cart(
        &self,
        request: AddToCartRequest,
    ) -> impl Future<Output = Result<Acknowledgement, BackendError>> + Send;

    /// Submit the whole cart as one sale.
    fn checkout(
        &self,
        request: CheckoutRequest,
    ) -> impl Future<Output = Result<Acknowledgement, BackendError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Status {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status 502: Bad Gateway");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = BackendError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
