//! POP3 response parser.
//!
//! Every POP3 response starts with a status line:
//! - Positive: `+OK 2 messages\r\n`
//! - Negative: `-ERR no such message\r\n`
//!
//! Positive replies to LIST and RETR are followed by a body terminated by a
//! line holding a single `.`. Body lines starting with `.` are byte-stuffed
//! by the server and must be unstuffed.

use crate::error::{Error, Result};
use crate::types::{ListEntry, Response, StatInfo, Status};

/// Parses a status line (line terminator already removed).
///
/// # Errors
///
/// Returns an error if the line starts with neither `+OK` nor `-ERR`.
pub fn parse_status_line(line: &[u8]) -> Result<Response> {
    let text = String::from_utf8_lossy(line);

    let (status, rest) = if let Some(rest) = text.strip_prefix("+OK") {
        (Status::Ok, rest)
    } else if let Some(rest) = text.strip_prefix("-ERR") {
        (Status::Err, rest)
    } else {
        return Err(Error::Protocol(format!("Invalid status line: {text}")));
    };

    // The indicator must be followed by a space or the end of the line
    if !rest.is_empty() && !rest.starts_with(' ') {
        return Err(Error::Protocol(format!("Invalid status line: {text}")));
    }

    Ok(Response::new(status, rest.trim()))
}

/// Parses the text of a positive STAT reply: `count size`.
///
/// # Errors
///
/// Returns an error if either number is missing or malformed.
pub fn parse_stat(text: &str) -> Result<StatInfo> {
    let mut fields = text.split_whitespace();
    let count = fields.next().and_then(|c| c.parse().ok());
    let size = fields.next().and_then(|s| s.parse().ok());

    match (count, size) {
        (Some(count), Some(size)) => Ok(StatInfo { count, size }),
        _ => Err(Error::Protocol(format!("Malformed STAT reply: {text}"))),
    }
}

/// Parses one scan listing line: `ordinal size`.
///
/// # Errors
///
/// Returns an error if the line is malformed or the ordinal is zero.
pub fn parse_list_entry(line: &[u8]) -> Result<ListEntry> {
    let text = String::from_utf8_lossy(line);
    let mut fields = text.split_whitespace();
    let ordinal = fields.next().and_then(|o| o.parse::<u32>().ok());
    let size = fields.next().and_then(|s| s.parse::<u64>().ok());

    match (ordinal, size) {
        (Some(ordinal), Some(size)) if ordinal > 0 => Ok(ListEntry { ordinal, size }),
        _ => Err(Error::Protocol(format!("Malformed LIST entry: {text}"))),
    }
}

/// Undoes byte-stuffing on one body line.
///
/// Returns `None` for the terminating `.` line.
#[must_use]
pub fn unstuff_line(line: &[u8]) -> Option<&[u8]> {
    if line == b"." {
        return None;
    }
    Some(line.strip_prefix(b".").unwrap_or(line))
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

    #[test]
    fn test_parse_ok_line() {
        let response = parse_status_line(b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>")
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(response.text, "POP3 server ready <1896.697170952@dbc.mtview.ca.us>");
    }

    #[test]
    fn test_parse_bare_ok() {
        let response = parse_status_line(b"+OK").unwrap();
        assert!(response.is_ok());
        assert_eq!(response.text, "");
    }

    #[test]
    fn test_parse_err_line() {
        let response = parse_status_line(b"-ERR [AUTH] invalid password").unwrap();
        assert_eq!(response.status, Status::Err);
        assert_eq!(response.text, "[AUTH] invalid password");
    }

    #[test]
    fn test_parse_invalid_line() {
        assert!(parse_status_line(b"* OK IMAP ready").is_err());
        assert!(parse_status_line(b"+OKAY").is_err());
        assert!(parse_status_line(b"").is_err());
    }

    #[test]
    fn test_parse_stat() {
        let stat = parse_stat("2 320").unwrap();
        assert_eq!(stat, StatInfo { count: 2, size: 320 });
        assert!(parse_stat("two 320").is_err());
        assert!(parse_stat("2").is_err());
    }

    #[test]
    fn test_parse_list_entry() {
        let entry = parse_list_entry(b"3 1205").unwrap();
        assert_eq!(entry.ordinal, 3);
        assert_eq!(entry.size, 1205);
        assert!(parse_list_entry(b"0 10").is_err());
        assert!(parse_list_entry(b"x").is_err());
    }

    #[test]
    fn test_unstuff_line() {
        assert_eq!(unstuff_line(b"."), None);
        assert_eq!(unstuff_line(b".."), Some(&b"."[..]));
        assert_eq!(unstuff_line(b"..leading dot"), Some(&b".leading dot"[..]));
        assert_eq!(unstuff_line(b"plain"), Some(&b"plain"[..]));
        assert_eq!(unstuff_line(b""), Some(&b""[..]));
    }
}
