//! Plain-text message generation.

use crate::content_type::ContentType;
use crate::encoding::{encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::TransferEncoding;
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static MESSAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Builder for a single-part `text/plain` message.
///
/// ```
/// use popmail_mime::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Test Message")
///     .text_body("Hello, World!")
///     .build()
///     .unwrap();
///
/// assert!(message.to_string().contains("Subject: Test Message\r\n"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
    in_reply_to: Option<String>,
    references: Option<String>,
    text_body: String,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Sets the subject. Non-ASCII text is RFC 2047 encoded on build.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the Date header. Defaults to the current time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the Message-ID. A fresh one is generated when unset.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the In-Reply-To header.
    #[must_use]
    pub fn in_reply_to(mut self, id: impl Into<String>) -> Self {
        self.in_reply_to = Some(id.into());
        self
    }

    /// Sets the References header.
    #[must_use]
    pub fn references(mut self, ids: impl Into<String>) -> Self {
        self.references = Some(ids.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = body.into();
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] when the sender or every recipient
    /// is missing.
    pub fn build(self) -> Result<ComposedMessage> {
        let from = self
            .from
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::MissingHeader("From".into()))?;
        if self.to.is_empty() {
            return Err(Error::MissingHeader("To".into()));
        }

        let date = self
            .date
            .unwrap_or_else(|| Utc::now().fixed_offset())
            .to_rfc2822();
        let message_id = self
            .message_id
            .unwrap_or_else(|| generate_message_id(domain_of(&from)));

        let mut headers = Headers::new();
        headers.add("From", from);
        headers.add("To", self.to.join(", "));
        headers.add(
            "Subject",
            encode_rfc2047(self.subject.as_deref().unwrap_or_default(), "utf-8")?,
        );
        headers.add("Date", date);
        headers.add("Message-ID", message_id);
        if let Some(id) = self.in_reply_to {
            headers.add("In-Reply-To", id);
        }
        if let Some(ids) = self.references {
            headers.add("References", ids);
        }
        headers.add("MIME-Version", "1.0");
        headers.add("Content-Type", ContentType::text_plain().to_string());
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::QuotedPrintable.to_string(),
        );

        Ok(ComposedMessage {
            headers,
            body: encode_quoted_printable(&self.text_body),
        })
    }
}

/// A message ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// Headers in output order.
    pub headers: Headers,
    /// Transfer-encoded body with CRLF line endings.
    pub body: String,
}

impl ComposedMessage {
    /// Returns the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Serializes the message to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for ComposedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n{}", self.headers, self.body)
    }
}

fn domain_of(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>').trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost")
}

fn generate_message_id(domain: &str) -> String {
    let now = Utc::now();
    let seq = MESSAGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "<{}.{}.{}.{seq}@{domain}>",
        now.timestamp(),
        now.timestamp_subsec_nanos(),
        std::process::id()
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::encoding::decode_rfc2047;
    use crate::message::Message;

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc2822("Tue, 1 Jul 2025 10:00:00 +0000").unwrap()
    }

    #[test]
    fn test_build_plain_message() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Hello")
            .date(fixed_date())
            .message_id("<fixed@example.com>")
            .text_body("Line one\nLine two")
            .build()
            .unwrap();

        let text = message.to_string();
        assert!(text.starts_with("From: sender@example.com\r\nTo: recipient@example.com\r\n"));
        assert!(text.contains("Subject: Hello\r\n"));
        assert!(text.contains("Jul 2025 10:00:00 +0000\r\n"));
        assert!(text.contains("Message-ID: <fixed@example.com>\r\n"));
        assert!(text.contains("MIME-Version: 1.0\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(text.ends_with("\r\n\r\nLine one\r\nLine two"));
        assert!(!text.contains("In-Reply-To"));
    }

    #[test]
    fn test_build_reply_headers() {
        let message = MessageBuilder::new()
            .from("me@example.com")
            .to("jane@example.com")
            .subject("Re: Status update")
            .in_reply_to("<abc@example.com>")
            .references("<abc@example.com>")
            .build()
            .unwrap();

        assert_eq!(message.headers.get("In-Reply-To"), Some("<abc@example.com>"));
        assert_eq!(message.headers.get("References"), Some("<abc@example.com>"));
    }

    #[test]
    fn test_build_encodes_non_ascii_subject() {
        let message = MessageBuilder::new()
            .from("me@example.com")
            .to("you@example.com")
            .subject("Réunion à 10h")
            .build()
            .unwrap();

        let subject = message.headers.get("Subject").unwrap();
        assert!(subject.starts_with("=?utf-8?B?"));
        assert_eq!(decode_rfc2047(subject), "Réunion à 10h");
    }

    #[test]
    fn test_build_requires_sender_and_recipient() {
        let missing_from = MessageBuilder::new().to("you@example.com").build();
        assert!(matches!(missing_from, Err(Error::MissingHeader(h)) if h == "From"));

        let missing_to = MessageBuilder::new().from("me@example.com").build();
        assert!(matches!(missing_to, Err(Error::MissingHeader(h)) if h == "To"));
    }

    #[test]
    fn test_generated_message_ids_are_unique() {
        let build = || {
            MessageBuilder::new()
                .from("me@mail.example.org")
                .to("you@example.com")
                .build()
                .unwrap()
        };
        let first = build();
        let second = build();

        let id = first.message_id().unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@mail.example.org>"));
        assert_ne!(first.message_id(), second.message_id());
    }

    #[test]
    fn test_built_message_parses_back() {
        let message = MessageBuilder::new()
            .from("me@example.com")
            .to("you@example.com")
            .subject("Grüße")
            .text_body("Schöne Grüße aus Köln")
            .build()
            .unwrap();

        let parsed = Message::parse(&message.to_bytes());
        assert_eq!(parsed.subject().map(decode_rfc2047).as_deref(), Some("Grüße"));
        assert_eq!(
            parsed.leaves()[0].decode_text().unwrap(),
            "Schöne Grüße aus Köln"
        );
    }
}
