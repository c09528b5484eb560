//! Error types for the mail-access layer.

use std::fmt;

use thiserror::Error;

/// Errors that can occur in mail operations.
#[derive(Debug, Error)]
pub enum MailError {
    /// Server unreachable, TLS failure, bad greeting or timeout.
    #[error("Connection failed: {0}")]
    Connectivity(String),

    /// Credentials rejected by the server.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// One message could not be retrieved or decoded.
    #[error("Failed to fetch message {ordinal}: {reason}")]
    Fetch {
        /// Ordinal of the message within the current listing.
        ordinal: u32,
        /// What went wrong.
        reason: String,
    },

    /// Submission failed.
    #[error("Send failed during {stage}: {reason}")]
    Send {
        /// Stage of the SMTP exchange that failed.
        stage: SendStage,
        /// What went wrong.
        reason: String,
    },

    /// Address could not be used in an SMTP envelope.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error outside of a mail protocol exchange.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailError {
    pub(crate) fn send(stage: SendStage, error: impl fmt::Display) -> Self {
        Self::Send {
            stage,
            reason: error.to_string(),
        }
    }

    pub(crate) fn fetch(ordinal: u32, error: impl fmt::Display) -> Self {
        Self::Fetch {
            ordinal,
            reason: error.to_string(),
        }
    }
}

/// Stage of an SMTP submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    /// Building the message.
    Compose,
    /// TCP connect or TLS handshake.
    Connect,
    /// Server greeting and EHLO.
    Greeting,
    /// STARTTLS upgrade.
    StartTls,
    /// AUTH exchange.
    Authentication,
    /// MAIL FROM and RCPT TO.
    Envelope,
    /// DATA and message transfer.
    Transmit,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compose => "compose",
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::StartTls => "STARTTLS",
            Self::Authentication => "authentication",
            Self::Envelope => "envelope",
            Self::Transmit => "transmit",
        })
    }
}

/// Result type alias using [`MailError`].
pub type Result<T> = std::result::Result<T, MailError>;
