//! SMTP connection management with type-state pattern.

mod client;
mod framed;
mod stream;

pub use client::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, SmtpConnection,
};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// Server capabilities from the greeting and EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised with a value.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns the advertised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Picks the mechanism used by [`Client::authenticate`]: PLAIN unless
    /// the server advertises LOGIN without PLAIN.
    #[must_use]
    pub fn preferred_auth(&self) -> AuthMechanism {
        let mechanisms = self.auth_mechanisms();
        if mechanisms.contains(&AuthMechanism::Login) && !mechanisms.contains(&AuthMechanism::Plain)
        {
            AuthMechanism::Login
        } else {
            AuthMechanism::Plain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "smtp.example.com".into(),
            extensions: lines.iter().map(|l| Extension::parse(l)).collect(),
        }
    }

    #[test]
    fn test_capabilities() {
        let server = info(&["STARTTLS", "SIZE 1000", "AUTH PLAIN LOGIN"]);
        assert!(server.supports_starttls());
        assert_eq!(server.max_message_size(), Some(1000));
        assert_eq!(server.preferred_auth(), AuthMechanism::Plain);
    }

    #[test]
    fn test_login_only_server() {
        let server = info(&["AUTH LOGIN"]);
        assert_eq!(server.preferred_auth(), AuthMechanism::Login);
    }

    #[test]
    fn test_no_auth_advertised_defaults_to_plain() {
        let server = info(&["SIZE"]);
        assert_eq!(server.max_message_size(), None);
        assert!(server.auth_mechanisms().is_empty());
        assert_eq!(server.preferred_auth(), AuthMechanism::Plain);
    }
}
