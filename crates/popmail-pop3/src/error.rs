//! Error types for POP3 operations.

use std::io;
use std::time::Duration;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server answered a command with `-ERR`.
    #[error("{command} rejected: {message}")]
    Negative {
        /// Command keyword (e.g., RETR).
        command: &'static str,
        /// Text following `-ERR`.
        message: String,
    },

    /// Server rejected the USER/PASS exchange.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A read or write did not complete in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates a negative-response error.
    #[must_use]
    pub fn negative(command: &'static str, message: impl Into<String>) -> Self {
        Self::Negative {
            command,
            message: message.into(),
        }
    }

    /// Returns true if the server refused a command with `-ERR`.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        matches!(self, Self::Negative { .. } | Self::AuthenticationFailed(_))
    }
}
