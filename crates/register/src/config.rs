//! Register configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `TILL_BASE_URL` - Backend origin (default: `http://127.0.0.1:5000`)
//! - `TILL_SESSION_COOKIE` - Cookie header value of a logged-in cashier session
//! - `TILL_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 10)
//! - `TILL_PUSH_PATH` - Socket.IO mount path (default: `socket.io`)
//! - `TILL_PUSH_RECONNECT_SECS` - Delay before reconnecting the push channel,
//!   0 disables reconnection (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_PUSH_PATH: &str = "socket.io";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Register configuration.
///
/// Implements `Debug` manually to redact the session cookie.
#[derive(Clone)]
pub struct TillConfig {
    /// Backend origin, always ending in `/`
    pub base_url: Url,
    /// Session cookie forwarded on every request and on the push connection
    pub session_cookie: Option<SecretString>,
    /// Per-request timeout for backend calls
    pub request_timeout: Duration,
    /// Socket.IO mount path, without slashes
    pub push_path: String,
    /// Delay before reconnecting a dropped push channel (`None` = give up)
    pub push_reconnect_delay: Option<Duration>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for TillConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TillConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("push_path", &self.push_path)
            .field("push_reconnect_delay", &self.push_reconnect_delay)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl TillConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let base_url = parse_base_url(&env.or_default("TILL_BASE_URL", DEFAULT_BASE_URL))?;
        let session_cookie = env
            .optional("TILL_SESSION_COOKIE")
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);
        let request_timeout = Duration::from_secs(env.parse_or("TILL_REQUEST_TIMEOUT_SECS", 10)?);
        let push_path = env
            .or_default("TILL_PUSH_PATH", DEFAULT_PUSH_PATH)
            .trim_matches('/')
            .to_string();
        let reconnect_secs: u64 = env.parse_or("TILL_PUSH_RECONNECT_SECS", 5)?;
        let push_reconnect_delay = (reconnect_secs > 0).then(|| Duration::from_secs(reconnect_secs));

        Ok(Self {
            base_url,
            session_cookie,
            request_timeout,
            push_path,
            push_reconnect_delay,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `base_url` with every other setting at its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an http(s) URL.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| (key == "TILL_BASE_URL").then(|| base_url.to_string()))
    }

    /// Absolute URL of a backend endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be joined onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    /// Websocket URL of the Socket.IO endpoint (Engine.IO v4, websocket transport).
    ///
    /// # Errors
    ///
    /// Returns an error if the push path cannot be joined onto the base URL.
    pub fn push_url(&self) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join(&format!("{}/", self.push_path))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http -> ws and https -> wss are both permitted scheme changes
        let _ = url.set_scheme(scheme);
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional environment variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Get an environment variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse an environment variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse the backend origin, forcing a trailing slash so relative joins keep
/// any path prefix the backend is mounted under.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("TILL_BASE_URL".to_string(), reason);

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
