//! Integration tests for the Till register.
//!
//! Tests run the real [`HttpBackend`](till_register::backend::HttpBackend) and
//! [`PushSubscriber`](till_register::push::PushSubscriber) against in-process
//! fakes bound to ephemeral ports, so no external server is needed:
//!
//! ```bash
//! cargo test -p till-integration-tests
//! ```
//!
//! # Fixtures
//!
//! - [`FakeSalesServer`] - axum router serving the stock and sales endpoints
//!   with scripted replies
//! - [`FakePushServer`] - websocket server speaking just enough Engine.IO to
//!   push a script of frames
//! - [`RecordingHost`] - [`Host`] that records alerts and reload requests

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use till_register::view::{Region, Screen};
use till_register::{Host, TillConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response as WsResponse};

/// Cookie the fixtures configure and the fakes expect to see.
pub const SESSION_COOKIE: &str = "session=cashier-1";

/// Engine.IO open packet sent by [`FakePushServer`].
pub const OPEN_PACKET: &str =
    r#"0{"sid":"fake-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Config pointing at a fake server, with the session cookie set and
/// reconnection disabled.
#[must_use]
pub fn config_for(addr: SocketAddr) -> TillConfig {
    let mut config = TillConfig::for_base_url(&format!("http://{addr}")).unwrap();
    config.session_cookie = Some(SecretString::from(SESSION_COOKIE));
    config.push_reconnect_delay = None;
    config
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

// =============================================================================
// Sales backend
// =============================================================================

/// A scripted reply from the fake sales server.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(StatusCode, Value),
    Text(StatusCode, &'static str),
    RateLimited { retry_after: u64 },
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Json(status, body) => (status, Json(body)).into_response(),
            Self::Text(status, body) => (status, body).into_response(),
            Self::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                "slow down",
            )
                .into_response(),
        }
    }
}

/// Everything the fake sales server knows and has seen.
#[derive(Debug, Default)]
pub struct SalesState {
    catalog: Mutex<HashMap<i32, Value>>,
    add_replies: Mutex<VecDeque<Reply>>,
    checkout_replies: Mutex<VecDeque<Reply>>,
    add_requests: Mutex<Vec<Value>>,
    checkout_requests: Mutex<Vec<Value>>,
    cookies: Mutex<Vec<Option<String>>>,
}

/// In-process sales server.
pub struct FakeSalesServer {
    pub addr: SocketAddr,
    state: Arc<SalesState>,
}

impl FakeSalesServer {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(SalesState::default());
        let app = Router::new()
            .route("/stock/categories/{id}/products", get(list_products))
            .route("/sales/add_to_cart", post(add_to_cart))
            .route("/sales/checkout", post(checkout))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, app).into_future());

        Self { addr, state }
    }

    #[must_use]
    pub fn config(&self) -> TillConfig {
        config_for(self.addr)
    }

    /// List `products` (JSON objects) under a category.
    pub fn stock(&self, category: i32, products: Value) {
        self.state.catalog.lock().unwrap().insert(category, products);
    }

    pub fn reply_to_add(&self, reply: Reply) {
        self.state.add_replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_to_checkout(&self, reply: Reply) {
        self.state.checkout_replies.lock().unwrap().push_back(reply);
    }

    #[must_use]
    pub fn add_requests(&self) -> Vec<Value> {
        self.state.add_requests.lock().unwrap().clone()
    }

    #[must_use]
    pub fn checkout_requests(&self) -> Vec<Value> {
        self.state.checkout_requests.lock().unwrap().clone()
    }

    /// Cookie header of every request, in arrival order.
    #[must_use]
    pub fn cookies(&self) -> Vec<Option<String>> {
        self.state.cookies.lock().unwrap().clone()
    }
}

fn record_cookie(state: &SalesState, headers: &HeaderMap) {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.cookies.lock().unwrap().push(cookie);
}

async fn list_products(
    State(state): State<Arc<SalesState>>,
    Path(category): Path<i32>,
    headers: HeaderMap,
) -> Response {
    record_cookie(&state, &headers);
    let products = state.catalog.lock().unwrap().get(&category).cloned();
    match products {
        Some(products) => Json(json!({ "products": products })).into_response(),
        None => (StatusCode::NOT_FOUND, "Category not found").into_response(),
    }
}

async fn add_to_cart(
    State(state): State<Arc<SalesState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    record_cookie(&state, &headers);
    state.add_requests.lock().unwrap().push(body);
    let reply = state.add_replies.lock().unwrap().pop_front();
    reply.unwrap_or_else(|| {
        Reply::Json(
            StatusCode::OK,
            json!({ "success": true, "message": "Item added to cart" }),
        )
    })
}

async fn checkout(
    State(state): State<Arc<SalesState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    record_cookie(&state, &headers);
    state.checkout_requests.lock().unwrap().push(body);
    let reply = state.checkout_replies.lock().unwrap().pop_front();
    reply.unwrap_or_else(|| {
        Reply::Json(
            StatusCode::OK,
            json!({ "success": true, "message": "Sale completed successfully" }),
        )
    })
}

// =============================================================================
// Push server
// =============================================================================

/// In-process Socket.IO endpoint.
///
/// Each connection gets the open packet, waits for the namespace connect,
/// acknowledges it, then sends the script frame by frame. Whatever the
/// client sends is recorded.
pub struct FakePushServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    upgrades: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakePushServer {
    /// Bind to an ephemeral port and serve `script` to every connection.
    pub async fn start(script: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let upgrades = Arc::new(Mutex::new(Vec::new()));

        let (r, u) = (Arc::clone(&received), Arc::clone(&upgrades));
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_push_connection(
                    stream,
                    script.clone(),
                    Arc::clone(&r),
                    Arc::clone(&u),
                ));
            }
        });

        Self {
            addr,
            received,
            upgrades,
        }
    }

    #[must_use]
    pub fn config(&self) -> TillConfig {
        config_for(self.addr)
    }

    /// Text frames received from clients.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Request URI and cookie of every websocket upgrade.
    #[must_use]
    pub fn upgrades(&self) -> Vec<(String, Option<String>)> {
        self.upgrades.lock().unwrap().clone()
    }
}

async fn serve_push_connection(
    stream: TcpStream,
    script: Vec<String>,
    received: Arc<Mutex<Vec<String>>>,
    upgrades: Arc<Mutex<Vec<(String, Option<String>)>>>,
) {
    let on_upgrade = |request: &Request, response: WsResponse| -> Result<WsResponse, ErrorResponse> {
        let cookie = request
            .headers()
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        upgrades
            .lock()
            .unwrap()
            .push((request.uri().to_string(), cookie));
        Ok(response)
    };
    let Ok(mut ws) = accept_hdr_async(stream, on_upgrade).await else {
        return;
    };

    if ws.send(Message::text(OPEN_PACKET)).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = message {
            let text = text.as_str().to_string();
            let connected = text.starts_with("40");
            received.lock().unwrap().push(text);
            if connected {
                break;
            }
        }
    }

    if ws.send(Message::text(r#"40{"sid":"fake-socket"}"#)).await.is_err() {
        return;
    }
    for frame in script {
        if ws.send(Message::text(frame)).await.is_err() {
            return;
        }
    }

    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = message {
            received.lock().unwrap().push(text.as_str().to_string());
        }
    }
}

// =============================================================================
// Host
// =============================================================================

/// [`Host`] that records what the cashier would have seen.
#[derive(Debug, Default)]
pub struct RecordingHost {
    alerts: Mutex<Vec<String>>,
    redraws: Mutex<Vec<Region>>,
    reloads: AtomicUsize,
}

impl RecordingHost {
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn redraws(&self) -> Vec<Region> {
        self.redraws.lock().unwrap().clone()
    }

    #[must_use]
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Host for RecordingHost {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn request_reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn redraw(&self, region: Region, _screen: &Screen) {
        self.redraws.lock().unwrap().push(region);
    }
}
