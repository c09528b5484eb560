//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and charset
//! conversion.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use std::fmt::Write as _;
use tracing::warn;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// Whitespace (line breaks in transfer-encoded bodies) is ignored, and
/// missing padding is tolerated.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(&cleaned) {
        Ok(bytes) => Ok(bytes),
        Err(err) => STANDARD_NO_PAD
            .decode(cleaned.trim_end_matches('='))
            .map_err(|_| err.into()),
    }
}

/// Maximum line length for Quoted-Printable encoding.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input are kept as hard CRLF breaks; long lines get
/// soft breaks. Trailing whitespace on a line is always encoded.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        let bytes = line.as_bytes();
        let mut line_length = 0;

        for (pos, byte) in bytes.iter().enumerate() {
            let is_last = pos + 1 == bytes.len();
            let encoded_len = match byte {
                b'!'..=b'<' | b'>'..=b'~' => 1,
                b' ' | b'\t' if !is_last => 1,
                _ => 3,
            };

            if line_length + encoded_len > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if encoded_len == 1 {
                result.push(*byte as char);
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += encoded_len;
        }
    }

    result
}

/// Decodes Quoted-Printable data (RFC 2045) into raw bytes.
///
/// Soft line breaks are removed. Charset conversion is left to the caller.
///
/// # Errors
///
/// Returns an error if the input contains an invalid escape sequence.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if data[i] != b'=' {
            result.push(data[i]);
            i += 1;
            continue;
        }

        // Soft line break, possibly with transport padding before it
        let rest = &data[i + 1..];
        let padding = rest
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        let after = &rest[padding..];
        if after.starts_with(b"\r\n") {
            i += 1 + padding + 2;
            continue;
        }
        if after.starts_with(b"\n") {
            i += 1 + padding + 1;
            continue;
        }
        if after.is_empty() {
            break;
        }

        let byte = rest
            .get(..2)
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| Error::InvalidEncoding("Invalid quoted-printable escape".into()))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Decodes bytes in the named charset.
///
/// Unknown charsets fall back to UTF-8. Undecodable sequences are replaced
/// with U+FFFD rather than reported as errors.
#[must_use]
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let label = charset.trim().trim_matches('"');
    if label.is_empty() || label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
    {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
        let (decoded, _, _) = encoding.decode(bytes);
        decoded.into_owned()
    } else {
        warn!(charset = label, "Unknown charset, falling back to UTF-8");
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Pure ASCII text without `=?`
/// sequences is returned unchanged.
///
/// # Errors
///
/// Returns an error if the charset is empty.
pub fn encode_rfc2047(text: &str, charset: &str) -> Result<String> {
    if charset.is_empty() {
        return Err(Error::InvalidEncoding("Empty charset".to_string()));
    }

    if text.is_ascii() && !text.contains("=?") && !text.contains(['\r', '\n']) {
        return Ok(text.to_string());
    }

    // Keep each encoded word under the 75 character limit by splitting on
    // char boundaries.
    let max_chunk = 45;
    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > max_chunk {
            words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    Ok(words.join(" "))
}

/// A parsed `=?charset?encoding?text?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: char,
    text: &'a str,
}

impl EncodedWord<'_> {
    /// Parses an encoded word at the start of `input`.
    ///
    /// Returns the word and the number of bytes it spans.
    fn parse(input: &str) -> Option<(EncodedWord<'_>, usize)> {
        let body = input.strip_prefix("=?")?;
        let (charset, rest) = body.split_once('?')?;
        let (encoding, rest) = rest.split_once('?')?;
        let end = rest.find("?=")?;
        let text = &rest[..end];

        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }
        if text.contains(char::is_whitespace) {
            return None;
        }
        let encoding = match encoding {
            "B" | "b" => 'B',
            "Q" | "q" => 'Q',
            _ => return None,
        };

        // RFC 2231 language suffix: =?utf-8*en?Q?...?=
        let charset_only = charset.split('*').next().unwrap_or(charset);
        let consumed = 2 + charset.len() + 1 + 1 + 1 + end + 2;

        Some((
            EncodedWord {
                charset: charset_only,
                encoding,
                text,
            },
            consumed,
        ))
    }

    /// Decodes the word, falling back to lossy UTF-8 of the payload.
    fn decode(&self) -> String {
        let bytes = match self.encoding {
            'B' => decode_base64(self.text),
            _ => Ok(decode_q(self.text)),
        };

        match bytes {
            Ok(bytes) => decode_charset(self.charset, &bytes),
            Err(_) => String::from_utf8_lossy(self.text.as_bytes()).into_owned(),
        }
    }
}

/// Decodes RFC 2047 Q-encoding: `_` is a space, `=XX` a byte.
///
/// Malformed escapes are kept literally.
fn decode_q(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let escaped = bytes
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = escaped {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }

    result
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Each encoded word is decoded on its own with its declared charset and
/// the results are concatenated in order. Whitespace separating two
/// adjacent encoded words is dropped; any other text is kept as is.
/// Malformed words are left untouched, so this never fails.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_encoded_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some((word, consumed)) = EncodedWord::parse(candidate) {
            let only_space = before.chars().all(char::is_whitespace);
            if !(after_encoded_word && only_space) {
                result.push_str(before);
            }
            result.push_str(&word.decode());
            rest = &candidate[consumed..];
            after_encoded_word = true;
        } else {
            result.push_str(before);
            result.push_str("=?");
            rest = &candidate[2..];
            after_encoded_word = false;
        }
    }

    result.push_str(rest);
    result
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(&encoded).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_with_line_breaks() {
        let decoded = decode_base64("SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_missing_padding() {
        assert_eq!(decode_base64("SGk").unwrap(), b"Hi");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("!!!not base64!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_encode_ascii() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_encode_utf8() {
        let encoded = encode_quoted_printable("Héllo");
        assert_eq!(encoded, "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_encode_keeps_line_breaks() {
        let encoded = encode_quoted_printable("one\ntwo\r\nthree");
        assert_eq!(encoded, "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_encode_trailing_space() {
        assert_eq!(encode_quoted_printable("end "), "end=20");
    }

    #[test]
    fn test_quoted_printable_encode_long_line() {
        let line = "a".repeat(200);
        let encoded = encode_quoted_printable(&line);
        for physical in encoded.split("\r\n") {
            assert!(physical.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(
            decode_quoted_printable(encoded.as_bytes()).unwrap(),
            line.as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo").unwrap(),
            "Héllo".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(
            decode_quoted_printable(b"Hello=\r\nWorld").unwrap(),
            b"HelloWorld"
        );
        assert_eq!(
            decode_quoted_printable(b"Hello= \nWorld").unwrap(),
            b"HelloWorld"
        );
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable(b"bad =ZZ escape").is_err());
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset("iso-8859-1", &[0x48, 0xE9]), "Hé");
    }

    #[test]
    fn test_decode_charset_unknown_falls_back() {
        assert_eq!(decode_charset("x-made-up", b"plain"), "plain");
    }

    #[test]
    fn test_decode_charset_invalid_utf8_is_lossy() {
        assert_eq!(decode_charset("utf-8", b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8").unwrap(), "Hello");

        let encoded = encode_rfc2047("Héllo", "utf-8").unwrap();
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_rfc2047_decode_plain() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
    }

    #[test]
    fn test_rfc2047_decode_base64() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_decode_q() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
    }

    #[test]
    fn test_rfc2047_decode_lowercase_encoding() {
        assert_eq!(decode_rfc2047("=?UTF-8?q?caf=C3=A9?="), "café");
    }

    #[test]
    fn test_rfc2047_decode_mixed_segments() {
        let decoded = decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= and more");
        assert_eq!(decoded, "Re: Héllo and more");
    }

    #[test]
    fn test_rfc2047_decode_adjacent_words_drop_whitespace() {
        let decoded = decode_rfc2047("=?utf-8?Q?Hel?= =?utf-8?Q?lo?=");
        assert_eq!(decoded, "Hello");
    }

    #[test]
    fn test_rfc2047_decode_different_charsets() {
        let decoded = decode_rfc2047("=?iso-8859-1?Q?caf=E9?= =?utf-8?B?w6k=?=");
        assert_eq!(decoded, "caféé");
    }

    #[test]
    fn test_rfc2047_decode_display_name() {
        let decoded = decode_rfc2047("=?utf-8?Q?Jos=C3=A9?= <jose@example.com>");
        assert_eq!(decoded, "José <jose@example.com>");
    }

    #[test]
    fn test_rfc2047_decode_unknown_encoding_left_alone() {
        let raw = "=?utf-8?X?abc?=";
        assert_eq!(decode_rfc2047(raw), raw);
    }

    #[test]
    fn test_rfc2047_decode_unknown_charset_is_lossy() {
        assert_eq!(decode_rfc2047("=?x-unknown?Q?abc?="), "abc");
    }

    #[test]
    fn test_rfc2047_decode_bad_base64_is_lossy() {
        assert_eq!(decode_rfc2047("=?utf-8?B?@@@?="), "@@@");
    }

    #[test]
    fn test_rfc2047_decode_unterminated() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?abc"), "=?utf-8?Q?abc");
    }

    #[test]
    fn test_rfc2047_decode_language_suffix() {
        assert_eq!(decode_rfc2047("=?utf-8*en?Q?hi?="), "hi");
    }

    proptest! {
        #[test]
        fn rfc2047_round_trip(text in "\\PC{0,80}") {
            let encoded = encode_rfc2047(&text, "utf-8").unwrap();
            prop_assert_eq!(decode_rfc2047(&encoded), text);
        }

        #[test]
        fn quoted_printable_round_trip(text in "[^\r]{0,200}") {
            let encoded = encode_quoted_printable(&text);
            let decoded = decode_quoted_printable(encoded.as_bytes()).unwrap();
            let expected = text.replace('\n', "\r\n");
            prop_assert_eq!(String::from_utf8(decoded).unwrap(), expected);
        }
    }
}
