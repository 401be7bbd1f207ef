//! `reqwest` implementation of [`SalesBackend`].

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use till_core::{CategoryId, Product};
use tracing::{debug, instrument};

use super::wire::{Acknowledgement, AddToCartRequest, CheckoutRequest, ProductListing};
use super::{BackendError, SalesBackend};
use crate::config::TillConfig;

/// How much of an unexpected body to keep for diagnostics.
const BODY_SNIPPET_CHARS: usize = 200;

/// Client for the sales backend's JSON endpoints.
///
/// Cheaply cloneable; clones share one connection pool.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    config: TillConfig,
}

impl HttpBackend {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cookie is not a valid header value or
    /// the underlying HTTP client cannot be built.
    pub fn new(config: &TillConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let mut value = HeaderValue::from_str(cookie.expose_secret())?;
            value.set_sensitive(true);
            headers.insert(header::COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                config: config.clone(),
            }),
        })
    }

    /// Send a request and return the status and body text.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        debug!(status = %status, bytes = body.len(), "Backend responded");
        Ok((status, body))
    }

    async fn post_for_ack<B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Acknowledgement, BackendError> {
        let url = self.inner.config.endpoint(path)?;
        let (status, text) = self
            .send(self.inner.client.post(url).json(body))
            .await?;
        parse_acknowledgement(status, &text)
    }
}

impl SalesBackend for HttpBackend {
    #[instrument(skip(self), fields(category_id = %category))]
    async fn list_products(&self, category: CategoryId) -> Result<Vec<Product>, BackendError> {
        let url = self
            .inner
            .config
            .endpoint(&format!("stock/categories/{category}/products"))?;
        let (status, text) = self.send(self.inner.client.get(url)).await?;
        let listing: ProductListing = parse_success(status, &text)?;
        debug!(count = listing.products.len(), "Fetched category listing");
        Ok(listing.products)
    }

    #[instrument(skip(self), fields(product_id = %request.product_id))]
    async fn add_to_cart(&self, request: AddToCartRequest) -> Result<Acknowledgement, BackendError> {
        self.post_for_ack("sales/add_to_cart", &request).await
    }

    #[instrument(skip(self, request), fields(lines = request.cart.len(), payment_method = %request.payment_method))]
    async fn checkout(&self, request: CheckoutRequest) -> Result<Acknowledgement, BackendError> {
        self.post_for_ack("sales/checkout", &request).await
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

fn snippet(text: &str) -> String {
    text.chars().take(BODY_SNIPPET_CHARS).collect()
}

/// Parse a body that is only meaningful under a 2xx status.
fn parse_success<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, BackendError> {
    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %snippet(text),
            "Backend returned non-success status"
        );
        return Err(BackendError::Status {
            status: status.as_u16(),
            body: snippet(text),
        });
    }

    serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, body = %snippet(text), "Failed to parse backend response");
        BackendError::Parse(e)
    })
}

/// Parse an acknowledgement.
///
/// Business failures come back as 4xx/5xx with a JSON acknowledgement body,
/// so any status is accepted as long as the body parses.
fn parse_acknowledgement(status: StatusCode, text: &str) -> Result<Acknowledgement, BackendError> {
    match serde_json::from_str::<Acknowledgement>(text) {
        Ok(ack) => Ok(ack),
        Err(e) if status.is_success() => {
            tracing::error!(error = %e, body = %snippet(text), "Failed to parse acknowledgement");
            Err(BackendError::Parse(e))
        }
        Err(_) => Err(BackendError::Status {
            status: status.as_u16(),
            body: snippet(text),
        }),
    }
}
