//! Server and account configuration.
//!
//! Configuration is passed explicitly into every operation; nothing here is
//! global. [`MailConfig`] is usually loaded from a TOML file:
//!
//! ```toml
//! inbox_limit = 50
//!
//! [pop3]
//! host = "mail.example.com"
//! port = 110
//! security = "none"
//!
//! [smtp]
//! host = "mail.example.com"
//! port = 587
//! security = "starttls"
//! timeout_secs = 30
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MailError, Result};

/// Timeout applied to connect and to every read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Plaintext for the whole session.
    #[default]
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// Plaintext connect, then STLS/STARTTLS upgrade.
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

/// Which protocol a [`ServerConfig`] is for; decides default ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Mailbox retrieval.
    Pop3,
    /// Mail submission.
    Smtp,
}

impl Protocol {
    /// Returns the default port for a security mode.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Pop3, Security::None | Security::StartTls) => 110,
            (Self::Pop3, Security::Tls) => 995,
            (Self::Smtp, Security::None) => 25,
            (Self::Smtp, Security::StartTls) => 587,
            (Self::Smtp, Security::Tls) => 465,
        }
    }
}

/// Connection settings for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port. Left out of a config file, it is the protocol's
    /// default for the security mode.
    #[serde(default)]
    pub port: u16,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Connect and I/O timeout.
    #[serde(rename = "timeout_secs", with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl ServerConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>, protocol: Protocol) -> ServerConfigBuilder {
        ServerConfigBuilder::new(host, protocol)
    }

    const fn fill_default_port(&mut self, protocol: Protocol) {
        if self.port == 0 {
            self.port = protocol.default_port(self.security);
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MailError::Config(format!("{name}: host is empty")));
        }
        if self.port == 0 {
            return Err(MailError::Config(format!("{name}: port must be non-zero")));
        }
        if self.timeout.is_zero() {
            return Err(MailError::Config(format!("{name}: timeout must be non-zero")));
        }
        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    host: String,
    protocol: Protocol,
    port: Option<u16>,
    security: Security,
    timeout: Duration,
}

impl ServerConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            protocol,
            port: None,
            security: Security::None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect and I/O timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self
                .port
                .unwrap_or_else(|| self.protocol.default_port(self.security)),
            security: self.security,
            timeout: self.timeout,
        }
    }
}

/// Complete configuration for one account's servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Mailbox server.
    pub pop3: ServerConfig,
    /// Submission server.
    pub smtp: ServerConfig,
    /// Messages shown in the inbox listing.
    pub inbox_limit: usize,
    /// Window searched when looking a message up by ordinal.
    pub lookup_limit: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            pop3: ServerConfig::builder("localhost", Protocol::Pop3).build(),
            smtp: ServerConfig::builder("localhost", Protocol::Smtp)
                .security(Security::StartTls)
                .build(),
            inbox_limit: 50,
            lookup_limit: 100,
        }
    }
}

impl MailConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Config`] if the document is malformed or a value
    /// is out of range.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(s).map_err(|e| MailError::Config(e.to_string()))?;
        config.pop3.fill_default_port(Protocol::Pop3);
        config.smtp.fill_default_port(Protocol::Smtp);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Io`] if the file cannot be read, or
    /// [`MailError::Config`] if it is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks values that deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.pop3.validate("pop3")?;
        self.smtp.validate("smtp")?;
        if self.inbox_limit == 0 {
            return Err(MailError::Config("inbox_limit must be non-zero".into()));
        }
        if self.lookup_limit == 0 {
            return Err(MailError::Config("lookup_limit must be non-zero".into()));
        }
        Ok(())
    }
}

/// Account address and secret, passed into every operation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account address, also the login name.
    pub address: String,
    /// Password.
    pub secret: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Protocol::Pop3.default_port(Security::None), 110);
        assert_eq!(Protocol::Pop3.default_port(Security::Tls), 995);
        assert_eq!(Protocol::Smtp.default_port(Security::StartTls), 587);
        assert_eq!(Protocol::Smtp.default_port(Security::Tls), 465);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder("pop.example.com", Protocol::Pop3)
            .security(Security::Tls)
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.host, "pop.example.com");
        assert_eq!(config.port, 995);
        assert_eq!(config.timeout, Duration::from_secs(5));

        let config = ServerConfig::builder("smtp.example.com", Protocol::Smtp)
            .port(2525)
            .build();
        assert_eq!(config.port, 2525);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_defaults() {
        let config = MailConfig::default();
        assert_eq!(config.pop3.port, 110);
        assert_eq!(config.pop3.security, Security::None);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.security, Security::StartTls);
        assert_eq!(config.inbox_limit, 50);
        assert_eq!(config.lookup_limit, 100);
    }

    #[test]
    fn test_from_toml() {
        let config = MailConfig::from_toml_str(
            r#"
            inbox_limit = 20

            [pop3]
            host = "mail.example.com"
            port = 995
            security = "tls"

            [smtp]
            host = "mail.example.com"
            port = 587
            security = "starttls"
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.inbox_limit, 20);
        assert_eq!(config.lookup_limit, 100);
        assert_eq!(config.pop3.security, Security::Tls);
        assert_eq!(config.pop3.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.smtp.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_toml_port_follows_security() {
        let config = MailConfig::from_toml_str(
            r#"
            [pop3]
            host = "pop.example.com"

            [smtp]
            host = "smtp.example.com"
            security = "tls"
            "#,
        )
        .unwrap();

        assert_eq!(config.pop3.port, 110);
        assert_eq!(config.smtp.port, 465);
    }

    #[test]
    fn test_invalid_toml() {
        let err = MailConfig::from_toml_str("[pop3]\nhost = \"\"\nport = 110\n").unwrap_err();
        assert!(matches!(err, MailError::Config(msg) if msg.contains("pop3")));

        let err = MailConfig::from_toml_str("inbox_limit = \"many\"").unwrap_err();
        assert!(matches!(err, MailError::Config(_)));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("jane@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("jane@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
