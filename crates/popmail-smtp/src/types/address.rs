//! Envelope address type.

use crate::error::{Error, Result};
use std::fmt;

/// Bare `local@domain` address used in MAIL FROM and RCPT TO.
///
/// Display names and angle brackets are not accepted; callers extract the
/// address first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is empty, does not
    /// have exactly one `@` with text on both sides, or contains
    /// characters that would break the envelope command.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into().trim().to_string();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.contains(|c: char| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains invalid characters: {addr}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("Address must contain @: {addr}")));
        };
        if domain.contains('@') {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {addr}"
            )));
        }
        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {addr}"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("  jane@example.com ").unwrap();
        assert_eq!(addr.as_str(), "jane@example.com");
        assert_eq!(addr.to_string(), "jane@example.com");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Address::new("").is_err());
        assert!(Address::new("janeexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("jane@").is_err());
        assert!(Address::new("a@b@c").is_err());
    }

    #[test]
    fn test_rejects_display_name_and_injection() {
        assert!(Address::new("Jane Doe <jane@example.com>").is_err());
        assert!(Address::new("jane@example.com>\r\nRCPT TO:<x@y").is_err());
    }
}
