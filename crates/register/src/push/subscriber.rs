//! Websocket client for the Socket.IO push channel.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::codec::{self, DEFAULT_NAMESPACE, EnginePacket, SocketPacket};
use super::{PushError, PushEvent, PushHandler, dispatch};
use crate::config::TillConfig;

/// Silence allowed before the handshake tells us the ping cadence.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Long-lived subscription to the server's push channel.
#[derive(Clone)]
pub struct PushSubscriber {
    url: Url,
    session_cookie: Option<SecretString>,
    reconnect_delay: Option<Duration>,
}

impl std::fmt::Debug for PushSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSubscriber")
            .field("url", &self.url.as_str())
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

impl PushSubscriber {
    /// Create a subscriber for the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the push URL cannot be built.
    pub fn new(config: &TillConfig) -> Result<Self, PushError> {
        Ok(Self {
            url: config.push_url()?,
            session_cookie: config.session_cookie.clone(),
            reconnect_delay: config.push_reconnect_delay,
        })
    }

    /// Websocket URL this subscriber connects to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Run the subscription on a background task for the rest of the session.
    pub fn spawn<H: PushHandler + 'static>(self, handler: Arc<H>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run(handler.as_ref()).await {
                tracing::error!(error = %e, "Push channel stopped");
            }
        })
    }

    /// Keep a connection open, reconnecting after the configured delay.
    ///
    /// Returns only when reconnection is disabled, with the result of the
    /// last connection.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the last connection.
    pub async fn run<H: PushHandler + ?Sized>(&self, handler: &H) -> Result<(), PushError> {
        loop {
            let result = self.run_once(handler).await;
            match &result {
                Ok(()) => info!("Push channel closed by server"),
                Err(e) => warn!(error = %e, "Push channel failed"),
            }

            let Some(delay) = self.reconnect_delay else {
                return result;
            };
            debug!(?delay, "Reconnecting push channel");
            tokio::time::sleep(delay).await;
        }
    }

    /// Hold one connection until the server closes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established, the server
    /// rejects the namespace, or the server stops pinging.
    #[instrument(skip(self, handler), fields(url = %self.url))]
    pub async fn run_once<H: PushHandler + ?Sized>(&self, handler: &H) -> Result<(), PushError> {
        if self.url.scheme() == "wss" {
            install_crypto_provider();
        }

        let mut request = self.url.as_str().into_client_request()?;
        if let Some(cookie) = &self.session_cookie {
            let mut value = HeaderValue::from_str(cookie.expose_secret())?;
            value.set_sensitive(true);
            request.headers_mut().insert(COOKIE, value);
        }

        let (mut stream, _response) = connect_async(request).await?;
        debug!("Websocket open");

        let mut silence_limit = HANDSHAKE_TIMEOUT;

        loop {
            let next = tokio::time::timeout(silence_limit, stream.next())
                .await
                .map_err(|_| PushError::Timeout(silence_limit))?;

            let Some(message) = next else {
                return Ok(());
            };

            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            let packet = match codec::decode_engine(text.as_str()) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable frame");
                    continue;
                }
            };

            match packet {
                EnginePacket::Open(handshake) => {
                    silence_limit =
                        Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                    debug!(sid = %handshake.sid, "Engine handshake received");
                    stream
                        .send(Message::text(codec::encode_connect(DEFAULT_NAMESPACE)))
                        .await?;
                }
                EnginePacket::Ping(payload) => {
                    stream
                        .send(Message::text(codec::encode_pong(&payload)))
                        .await?;
                }
                EnginePacket::Message(payload) => {
                    if handle_socket_packet(handler, &payload)? {
                        return Ok(());
                    }
                }
                EnginePacket::Close => return Ok(()),
                EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
            }
        }
    }
}

/// Install ring as the process-wide rustls crypto provider.
///
/// A no-op when a provider is already installed.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Apply one Socket.IO packet. Returns `true` when the server disconnected us.
fn handle_socket_packet<H: PushHandler + ?Sized>(
    handler: &H,
    payload: &str,
) -> Result<bool, PushError> {
    let packet = match codec::decode_socket(payload) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(error = %e, "Dropping undecodable packet");
            return Ok(false);
        }
    };

    match packet {
        SocketPacket::Connect { namespace, .. } => {
            info!(%namespace, "Push channel connected");
        }
        SocketPacket::Event { name, args, .. } => match PushEvent::from_event(&name, args) {
            Ok(Some(event)) => {
                debug!(event = %name, "Push event");
                dispatch(handler, event);
            }
            Ok(None) => debug!(event = %name, "Ignoring unhandled push event"),
            Err(e) => warn!(event = %name, error = %e, "Malformed push event"),
        },
        SocketPacket::ConnectError { data, .. } => {
            let reason = match &data {
                Some(d) => d
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| d.to_string(), ToString::to_string),
                None => String::new(),
            };
            return Err(PushError::ConnectRejected(reason));
        }
        SocketPacket::Disconnect { namespace } => {
            info!(%namespace, "Server disconnected push channel");
            return Ok(true);
        }
        SocketPacket::Ignored(kind) => debug!(kind, "Ignoring socket packet"),
    }
    Ok(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use till_core::{LowStockAlert, ProductId, StockUpdate};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<StockUpdate>>,
        alerts: Mutex<Vec<LowStockAlert>>,
    }

    impl PushHandler for Recorder {
        fn on_stock_updated(&self, update: StockUpdate) {
            self.updates.lock().unwrap().push(update);
        }

        fn on_low_stock_alert(&self, alert: LowStockAlert) {
            self.alerts.lock().unwrap().push(alert);
        }
    }

    #[test]
    fn test_subscriber_url_from_config() {
        let config = TillConfig::for_base_url("https://till.example").unwrap();
        let subscriber = PushSubscriber::new(&config).unwrap();
        assert_eq!(
            subscriber.url().as_str(),
            "wss://till.example/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[tokio::test]
    async fn test_wss_connect_negotiates_tls() {
        use tokio_tungstenite::tungstenite::Error as WsError;
        use tokio_tungstenite::tungstenite::error::UrlError;

        // Plain TCP peer that hangs up: the client must get as far as the
        // TLS handshake before failing.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let config = TillConfig::for_base_url(&format!("https://{addr}")).unwrap();
        let subscriber = PushSubscriber::new(&config).unwrap();
        assert_eq!(subscriber.url().scheme(), "wss");

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            subscriber.run_once(&Recorder::default()),
        )
        .await
        .unwrap()
        .unwrap_err();

        let PushError::WebSocket(inner) = &err else {
            panic!("expected websocket error, got {err:?}");
        };
        assert!(
            !matches!(**inner, WsError::Url(UrlError::TlsFeatureNotEnabled)),
            "wss connect rejected before TLS: {inner}"
        );
    }

    #[test]
    fn test_event_packet_reaches_handler() {
        let recorder = Recorder::default();
        let done = handle_socket_packet(&recorder, r#"2["stock_updated",{"id":4,"stock":9}]"#)
            .unwrap();
        assert!(!done);
        assert_eq!(
            recorder.updates.lock().unwrap().as_slice(),
            &[StockUpdate {
                id: ProductId::new(4),
                stock: 9,
                name: None,
            }]
        );
    }

    #[test]
    fn test_malformed_packets_do_not_end_the_session() {
        let recorder = Recorder::default();
        assert!(!handle_socket_packet(&recorder, "2{}").unwrap());
        assert!(!handle_socket_packet(&recorder, r#"2["stock_updated",{"id":"x"}]"#).unwrap());
        assert!(!handle_socket_packet(&recorder, r#"2["chat",{"text":"hi"}]"#).unwrap());
        assert!(recorder.updates.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disconnect_ends_session() {
        let recorder = Recorder::default();
        assert!(handle_socket_packet(&recorder, "1").unwrap());
    }

    #[test]
    fn test_connect_error_is_reported() {
        let recorder = Recorder::default();
        let err = handle_socket_packet(&recorder, r#"4{"message":"Not authorized"}"#).unwrap_err();
        assert!(matches!(err, PushError::ConnectRejected(reason) if reason == "Not authorized"));
    }
}
