//! Top-level error type for the till binary.
//!
//! Library operations return their own error types; `TillError` gathers them
//! where the binary needs a single `Result`, and reports fatal ones to Sentry.

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::push::PushError;

/// Errors that end or interrupt a till session.
#[derive(Debug, Error)]
pub enum TillError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sales backend could not be reached or understood.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Push channel could not be set up.
    #[error("Push channel error: {0}")]
    Push(#[from] PushError),

    /// Terminal input or output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TillError {
    /// Log the error and capture it to Sentry.
    pub fn report(&self) {
        let event_id = sentry::capture_error(self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "Till stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_keep_their_message() {
        let err = TillError::from(BackendError::RateLimited(30));
        assert_eq!(
            err.to_string(),
            "Backend error: Rate limited, retry after 30 seconds"
        );

        let err = TillError::from(PushError::ConnectRejected("Not authorized".to_string()));
        assert_eq!(
            err.to_string(),
            "Push channel error: Connection rejected: Not authorized"
        );
    }
}
