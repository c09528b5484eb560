//! Message decoding: header fields, body selection and text cleanup.

use popmail_mime::encoding::decode_rfc2047;
use popmail_mime::{Leaf, Message};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MailError, Result};

/// Subject shown when a message has none.
pub const NO_SUBJECT: &str = "(No Subject)";

/// A decoded message as shown in listings and detail views.
///
/// The ordinal is only meaningful for the mailbox snapshot it was fetched
/// from; it can point at a different message in a later session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// 1-based position in the listing it came from.
    pub ordinal: u32,
    /// Raw `Date` header.
    pub date: String,
    /// Decoded `From` header.
    pub from: String,
    /// Decoded `To` header.
    pub to: String,
    /// Decoded `Cc` header.
    pub cc: String,
    /// Decoded subject.
    pub subject: String,
    /// Selected body text, unmodified.
    pub body: String,
    /// `Message-ID` header, empty when absent.
    pub message_id: String,
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Never fails: words with an unknown charset or a bad payload come back as
/// best-effort lossy text.
#[must_use]
pub fn decode_header_field(raw: &str) -> String {
    decode_rfc2047(raw)
}

/// Selects the body text of a raw message.
///
/// See [`select_body`] for the rules.
#[must_use]
pub fn extract_body(raw: &[u8]) -> String {
    select_body(&Message::parse(raw))
}

/// Selects the body text of a parsed message.
///
/// - A single-part message yields its payload whatever the content type.
/// - A multipart message yields the first `text/plain` part that is not an
///   attachment, else the first such `text/html` part.
/// - A message without any part yields an empty string.
///
/// Payloads are decoded with their transfer encoding and charset; a
/// payload that fails transfer decoding is returned raw.
#[must_use]
pub fn select_body(message: &Message) -> String {
    let leaves = message.leaves();

    if !message.is_multipart() {
        return leaves.first().map(leaf_text).unwrap_or_default();
    }

    let mut plain = None;
    let mut html = None;
    for leaf in leaves.iter().filter(|leaf| !leaf.is_attachment()) {
        if plain.is_none() && leaf.content_type.is("text", "plain") {
            plain = Some(leaf_text(leaf));
        } else if html.is_none() && leaf.content_type.is("text", "html") {
            html = Some(leaf_text(leaf));
        }
    }

    match (plain, html) {
        (Some(text), Some(html)) if text.is_empty() => html,
        (Some(text), _) => text,
        (None, html) => html.unwrap_or_default(),
    }
}

fn leaf_text(leaf: &Leaf<'_>) -> String {
    leaf.decode_text().unwrap_or_else(|e| {
        debug!(error = %e, content_type = %leaf.content_type, "Falling back to raw payload");
        leaf.raw_text()
    })
}

/// Collapses every whitespace run to a single space and trims the ends.
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes a raw message into a [`MessageRecord`].
///
/// # Errors
///
/// Returns [`MailError::Fetch`] if the data has no header section at all.
pub fn decode_message(ordinal: u32, raw: &[u8]) -> Result<MessageRecord> {
    let message = Message::parse(raw);
    if message.headers.is_empty() {
        return Err(MailError::fetch(ordinal, "message has no headers"));
    }

    let field = |value: Option<&str>| value.map(decode_header_field).unwrap_or_default();

    Ok(MessageRecord {
        ordinal,
        date: message.date().unwrap_or_default().to_string(),
        from: field(message.from()),
        to: field(message.to()),
        cc: field(message.cc()),
        subject: message
            .subject()
            .map_or_else(|| NO_SUBJECT.to_string(), decode_header_field),
        body: select_body(&message),
        message_id: message.message_id().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALTERNATIVE: &[u8] = b"From: Jane <jane@example.com>\r\n\
        Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
        \r\n\
        --b1\r\n\
        Content-Type: text/html\r\n\
        \r\n\
        <p>html</p>\r\n\
        --b1\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        plain text\r\n\
        --b1--\r\n";

    #[test]
    fn test_decode_header_field() {
        assert_eq!(decode_header_field("=?UTF-8?B?w6l0w6k=?="), "été");
        assert_eq!(
            decode_header_field("=?iso-8859-1?Q?caf=E9?= au lait"),
            "café au lait"
        );
        assert_eq!(decode_header_field("plain subject"), "plain subject");
    }

    #[test]
    fn test_decode_header_field_unknown_charset() {
        assert_eq!(decode_header_field("=?x-nope?B?aGk=?="), "hi");
    }

    #[test]
    fn test_plain_preferred_over_html() {
        assert_eq!(extract_body(ALTERNATIVE), "plain text");
    }

    #[test]
    fn test_html_only() {
        let raw = b"Content-Type: multipart/alternative; boundary=x\r\n\r\n\
            --x\r\nContent-Type: text/html\r\n\r\n<b>hi</b>\r\n--x--\r\n";
        assert_eq!(extract_body(raw), "<b>hi</b>");
    }

    #[test]
    fn test_attachment_skipped() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n\
            --x\r\n\
            Content-Type: text/plain\r\n\
            Content-Disposition: ATTACHMENT; filename=notes.txt\r\n\
            \r\n\
            attached notes\r\n\
            --x\r\n\
            Content-Type: text/html\r\n\
            \r\n\
            <p>body</p>\r\n\
            --x--\r\n";
        assert_eq!(extract_body(raw), "<p>body</p>");
    }

    #[test]
    fn test_first_plain_part_wins() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n\
            --x\r\nContent-Type: text/plain\r\n\r\nfirst\r\n\
            --x\r\nContent-Type: text/plain\r\n\r\nsecond\r\n--x--\r\n";
        assert_eq!(extract_body(raw), "first");
    }

    #[test]
    fn test_nested_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=outer\r\n\r\n\
            --outer\r\n\
            Content-Type: multipart/alternative; boundary=inner\r\n\
            \r\n\
            --inner\r\nContent-Type: text/plain\r\n\r\nnested plain\r\n--inner--\r\n\
            --outer\r\n\
            Content-Type: application/pdf\r\n\r\nJVBERi0=\r\n\
            --outer--\r\n";
        assert_eq!(extract_body(raw), "nested plain");
    }

    #[test]
    fn test_single_part_encodings() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\r\n\
            Content-Transfer-Encoding: quoted-printable\r\n\
            \r\n\
            caf=E9";
        assert_eq!(extract_body(raw), "café");

        let raw = b"Content-Type: text/html\r\nContent-Transfer-Encoding: base64\r\n\r\nPGI+aGk8L2I+";
        assert_eq!(extract_body(raw), "<b>hi</b>");
    }

    #[test]
    fn test_bad_transfer_encoding_falls_back_to_raw() {
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\n***not base64***";
        assert_eq!(extract_body(raw), "***not base64***");
    }

    #[test]
    fn test_no_parts_is_empty() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x--\r\n";
        assert_eq!(extract_body(raw), "");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello\n\n  World\t!"), "Hello World !");
        assert_eq!(clean_text("   "), "");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_decode_message() {
        let raw = b"Date: Mon, 7 Jul 2025 10:00:00 +0000\r\n\
            From: =?UTF-8?Q?Ren=C3=A9?= <rene@example.com>\r\n\
            To: jane@example.com\r\n\
            Cc: bob@example.com\r\n\
            Subject: =?UTF-8?B?w6l0w6k=?=\r\n\
            Message-ID: <abc@example.com>\r\n\
            \r\n\
            Hi there\r\n";
        let record = decode_message(7, raw).unwrap();

        assert_eq!(record.ordinal, 7);
        assert_eq!(record.date, "Mon, 7 Jul 2025 10:00:00 +0000");
        assert_eq!(record.from, "René <rene@example.com>");
        assert_eq!(record.to, "jane@example.com");
        assert_eq!(record.cc, "bob@example.com");
        assert_eq!(record.subject, "été");
        assert_eq!(record.message_id, "<abc@example.com>");
        assert_eq!(record.body, "Hi there\r\n");
    }

    #[test]
    fn test_decode_message_defaults() {
        let record = decode_message(1, b"From: a@example.com\r\n\r\nbody").unwrap();
        assert_eq!(record.subject, NO_SUBJECT);
        assert_eq!(record.message_id, "");
        assert_eq!(record.cc, "");
    }

    #[test]
    fn test_decode_message_without_headers() {
        let err = decode_message(3, b"").unwrap_err();
        assert!(matches!(err, MailError::Fetch { ordinal: 3, .. }));
    }

    #[test]
    fn test_record_serializes() {
        let record = decode_message(2, b"Subject: hi\r\n\r\nx").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ordinal"], 2);
        assert_eq!(json["subject"], "hi");
    }

    proptest! {
        #[test]
        fn prop_clean_text_normalized(text in "\\PC*") {
            let cleaned = clean_text(&text);
            prop_assert!(!cleaned.contains("  "));
            prop_assert_eq!(cleaned.trim(), cleaned.as_str());
        }

        #[test]
        fn prop_header_round_trip(text in "\\PC{1,60}") {
            let encoded = popmail_mime::encoding::encode_rfc2047(&text, "utf-8").unwrap();
            prop_assert_eq!(decode_header_field(&encoded), text);
        }
    }
}
