//! MIME message structure and parsing.
//!
//! A raw message is parsed into a tree: every node carries its headers and
//! a [`Body`], which is either a single leaf payload or an ordered list of
//! nested parts. [`Message::leaves`] walks the tree depth-first in document
//! order.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable};
use crate::error::Result;
use crate::header::Headers;
use std::fmt;

/// Nesting limit for multipart bodies. Deeper parts are kept as opaque
/// single parts.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from a header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Undoes the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid for the encoding.
    pub fn decode(self, payload: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(&String::from_utf8_lossy(payload)),
            Self::QuotedPrintable => decode_quoted_printable(payload),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(payload.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Body of a message or part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A leaf payload, still transfer-encoded.
    SinglePart {
        /// Declared (or defaulted) content type.
        content_type: ContentType,
        /// Declared transfer encoding.
        encoding: TransferEncoding,
        /// Raw payload bytes.
        bytes: Vec<u8>,
    },
    /// An ordered list of sub-parts.
    MultiPart {
        /// The `multipart/*` content type.
        content_type: ContentType,
        /// Sub-parts in document order.
        parts: Vec<Part>,
    },
}

impl Body {
    /// Returns the content type of this body.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        match self {
            Self::SinglePart { content_type, .. } | Self::MultiPart { content_type, .. } => {
                content_type
            }
        }
    }

    /// Returns true for a multipart body.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::MultiPart { .. })
    }

    /// Collects the leaves below this body, depth-first.
    fn collect_leaves<'a>(&'a self, headers: &'a Headers, out: &mut Vec<Leaf<'a>>) {
        match self {
            Self::SinglePart {
                content_type,
                encoding,
                bytes,
            } => out.push(Leaf {
                headers,
                content_type,
                encoding: *encoding,
                bytes,
            }),
            Self::MultiPart { parts, .. } => {
                for part in parts {
                    part.body.collect_leaves(&part.headers, out);
                }
            }
        }
    }
}

/// A MIME part: its own headers plus a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

impl Part {
    /// Parses a part (headers, blank line, body).
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        parse_entity(raw, 0)
    }
}

/// A single-part payload reached while walking a message.
#[derive(Debug, Clone, Copy)]
pub struct Leaf<'a> {
    /// Headers of the part that owns this payload.
    pub headers: &'a Headers,
    /// Content type of the payload.
    pub content_type: &'a ContentType,
    /// Transfer encoding of the payload.
    pub encoding: TransferEncoding,
    /// Raw, still-encoded payload.
    pub bytes: &'a [u8],
}

impl Leaf<'_> {
    /// Returns true if the part's `Content-Disposition` mentions
    /// `attachment`, in any case and position.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("content-disposition")
            .is_some_and(|value| value.to_ascii_lowercase().contains("attachment"))
    }

    /// Returns the payload with its transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match its transfer encoding.
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        self.encoding.decode(self.bytes)
    }

    /// Returns the payload as text, using the declared charset.
    ///
    /// Bytes that do not decode in the charset are replaced with U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer encoding cannot be undone.
    pub fn decode_text(&self) -> Result<String> {
        let bytes = self.decode_bytes()?;
        Ok(decode_charset(
            self.content_type.charset().unwrap_or("utf-8"),
            &bytes,
        ))
    }

    /// Returns the raw payload as lossy UTF-8, without any decoding.
    #[must_use]
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(self.bytes).into_owned()
    }
}

/// A parsed MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    /// Top-level body.
    pub body: Body,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// Parsing is lenient: malformed content types fall back to
    /// `text/plain`, multipart bodies without a boundary become single
    /// parts, and a message without a blank line is all headers.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let Part { headers, body } = parse_entity(raw, 0);
        Self { headers, body }
    }

    /// Returns every leaf payload in document order.
    #[must_use]
    pub fn leaves(&self) -> Vec<Leaf<'_>> {
        let mut out = Vec::new();
        self.body.collect_leaves(&self.headers, &mut out);
        out
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        self.body.is_multipart()
    }

    /// Gets the raw From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the raw To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the raw Cc header.
    #[must_use]
    pub fn cc(&self) -> Option<&str> {
        self.headers.get("cc")
    }

    /// Gets the raw Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }
}

/// Parses headers and body of one entity, recursing into multiparts.
fn parse_entity(raw: &[u8], depth: usize) -> Part {
    let (header_bytes, body_bytes) = split_headers_body(raw);
    let headers = Headers::parse(&String::from_utf8_lossy(header_bytes));
    let content_type = ContentType::parse_or_default(headers.get("content-type"));
    let encoding = headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

    let body = match content_type.boundary() {
        Some(boundary) if content_type.is_multipart() && depth < MAX_DEPTH => {
            let parts = split_multipart(body_bytes, boundary)
                .into_iter()
                .map(|chunk| parse_entity(chunk, depth + 1))
                .collect();
            Body::MultiPart {
                content_type,
                parts,
            }
        }
        _ => Body::SinglePart {
            content_type,
            encoding,
            bytes: body_bytes.to_vec(),
        },
    };

    Part { headers, body }
}

/// Splits an entity at the first blank line.
fn split_headers_body(raw: &[u8]) -> (&[u8], &[u8]) {
    // A part may start with the blank line directly (no headers at all)
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&[], rest);
    }

    let crlf = find(raw, b"\r\n\r\n");
    let lf = find(raw, b"\n\n");

    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => (&raw[..l], &raw[l + 2..]),
        (Some(c), _) => (&raw[..c], &raw[c + 4..]),
        (None, Some(l)) => (&raw[..l], &raw[l + 2..]),
        (None, None) => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits a multipart body into its parts.
///
/// Delimiter lines are `--boundary` (optionally followed by whitespace);
/// `--boundary--` closes the body. The line break before a delimiter
/// belongs to the delimiter. An unterminated final part is kept.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = &body[pos..line_end];

        if let Some(rest) = line.strip_prefix(delimiter) {
            let is_close = rest.starts_with(b"--");
            if is_close || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = current_start.take() {
                    parts.push(&body[start..part_end(body, start, pos)]);
                }
                if is_close {
                    return parts;
                }
                current_start = Some(next);
            }
        }

        pos = next;
    }

    if let Some(start) = current_start
        && start < body.len()
    {
        parts.push(&body[start..]);
    }

    parts
}

/// End of a part whose delimiter line starts at `delimiter_pos`.
fn part_end(body: &[u8], start: usize, delimiter_pos: usize) -> usize {
    let mut end = delimiter_pos;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
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

    const ALTERNATIVE: &str = concat!(
        "From: sender@example.com\r\n",
        "Subject: Alt\r\n",
        "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
        "\r\n",
        "preamble\r\n",
        "--b1\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "plain body\r\n",
        "--b1\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<p>html body</p>\r\n",
        "--b1--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_parse_single_part() {
        let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nHello, World!\r\n";
        let message = Message::parse(raw);

        assert_eq!(message.from(), Some("a@example.com"));
        assert_eq!(message.subject(), Some("Hi"));
        assert!(!message.is_multipart());

        let leaves = message.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].decode_text().unwrap(), "Hello, World!\r\n");
    }

    #[test]
    fn test_parse_lf_only_message() {
        let raw = b"Subject: Hi\n\nbody\n";
        let message = Message::parse(raw);
        assert_eq!(message.subject(), Some("Hi"));
        assert_eq!(message.leaves()[0].bytes, b"body\n");
    }

    #[test]
    fn test_parse_headers_only_message() {
        let message = Message::parse(b"Subject: Only headers\r\n");
        assert_eq!(message.subject(), Some("Only headers"));
        assert!(message.leaves()[0].bytes.is_empty());
    }

    #[test]
    fn test_parse_multipart_alternative() {
        let message = Message::parse(ALTERNATIVE.as_bytes());
        assert!(message.is_multipart());

        let leaves = message.leaves();
        assert_eq!(leaves.len(), 2);
        assert!(leaves[0].content_type.is("text", "plain"));
        assert_eq!(leaves[0].decode_text().unwrap(), "plain body");
        assert!(leaves[1].content_type.is("text", "html"));
        assert_eq!(leaves[1].decode_text().unwrap(), "<p>html body</p>");
    }

    #[test]
    fn test_parse_nested_multipart() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "nested text\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Disposition: attachment; filename=a.pdf\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--outer--\r\n",
        );
        let message = Message::parse(raw.as_bytes());

        let leaves = message.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].decode_text().unwrap(), "nested text");
        assert!(!leaves[0].is_attachment());
        assert!(leaves[1].is_attachment());
        assert_eq!(leaves[1].decode_bytes().unwrap(), b"%PDF-");
    }

    #[test]
    fn test_attachment_marker_anywhere_in_disposition() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: inline\r\n",
            "\r\n",
            "body\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: ATTACHMENT;filename=notes.txt\r\n",
            "\r\n",
            "notes\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: x-attachment-ish\r\n",
            "\r\n",
            "odd\r\n",
            "--b--\r\n",
        );
        let message = Message::parse(raw.as_bytes());

        let flags: Vec<bool> = message.leaves().iter().map(Leaf::is_attachment).collect();
        assert_eq!(flags, vec![false, true, true]);
    }

    #[test]
    fn test_parse_quoted_printable_latin1_part() {
        let raw = concat!(
            "Content-Type: text/plain; charset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=E9 cr=\r\n",
            "=E8me",
        );
        let message = Message::parse(raw.as_bytes());
        assert_eq!(message.leaves()[0].decode_text().unwrap(), "café crème");
    }

    #[test]
    fn test_parse_multipart_without_boundary_is_single_part() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\nbody\r\n";
        let message = Message::parse(raw);
        assert!(!message.is_multipart());
        assert_eq!(message.leaves().len(), 1);
    }

    #[test]
    fn test_parse_unterminated_multipart_keeps_last_part() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=z\r\n",
            "\r\n",
            "--z\r\n",
            "\r\n",
            "dangling",
        );
        let message = Message::parse(raw.as_bytes());
        let leaves = message.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].raw_text(), "dangling");
    }

    #[test]
    fn test_parse_multipart_with_no_parts() {
        let raw = b"Content-Type: multipart/mixed; boundary=z\r\n\r\n--z--\r\n";
        let message = Message::parse(raw);
        assert!(message.is_multipart());
        assert!(message.leaves().is_empty());
    }

    #[test]
    fn test_invalid_base64_part_reports_error() {
        let raw = concat!(
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "!!!!\r\n",
        );
        let message = Message::parse(raw.as_bytes());
        let leaf = message.leaves()[0];
        assert!(leaf.decode_text().is_err());
        assert_eq!(leaf.raw_text(), "!!!!\r\n");
    }
}
