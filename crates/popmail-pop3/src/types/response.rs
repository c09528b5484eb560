//! POP3 status responses.

use std::fmt;

/// Status indicator of a POP3 response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK`
    Ok,
    /// `-ERR`
    Err,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("+OK"),
            Self::Err => f.write_str("-ERR"),
        }
    }
}

/// First line of a POP3 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status indicator.
    pub status: Status,
    /// Text after the indicator, without the separating space.
    pub text: String,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
