//! CSV export of mailbox contents.

use std::borrow::Cow;
use std::io::Write;

use popmail_mime::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::{Credentials, ServerConfig};
use crate::decoder::{clean_text, decode_header_field, select_body};
use crate::error::{MailError, Result};
use crate::session::MailboxSession;

/// Column names, in output order.
pub const CSV_HEADER: [&str; 6] = ["Date", "From", "To", "CC", "Subject", "Email_Text"];

/// What to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Only the newest `limit` messages; `None` or `Some(0)` means all.
    pub limit: Option<usize>,
    /// Keep only messages whose `From` contains the account address.
    pub sent_only: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            limit: None,
            sent_only: true,
        }
    }
}

/// Counters reported after an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Messages fetched and decoded, including filtered ones.
    pub processed: usize,
    /// Rows written.
    pub exported: usize,
    /// Messages that could not be fetched.
    pub skipped: usize,
}

/// One exported row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRow {
    /// Raw `Date` header.
    pub date: String,
    /// Decoded `From`.
    pub from: String,
    /// Decoded `To`.
    pub to: String,
    /// Decoded `Cc`.
    pub cc: String,
    /// Decoded subject, empty when absent.
    pub subject: String,
    /// Body with whitespace collapsed.
    pub email_text: String,
}

impl ExportRow {
    /// Builds a row from a raw message.
    #[must_use]
    pub fn from_raw(raw: &[u8]) -> Self {
        let message = Message::parse(raw);
        let field = |value: Option<&str>| value.map(decode_header_field).unwrap_or_default();

        Self {
            date: message.date().unwrap_or_default().to_string(),
            from: field(message.from()),
            to: field(message.to()),
            cc: field(message.cc()),
            subject: field(message.subject()),
            email_text: clean_text(&select_body(&message)),
        }
    }

    /// Returns true if the row was sent from `address` (case-insensitive).
    #[must_use]
    pub fn is_from(&self, address: &str) -> bool {
        self.from
            .to_lowercase()
            .contains(&address.to_lowercase())
    }

    fn fields(&self) -> [&str; 6] {
        [
            &self.date,
            &self.from,
            &self.to,
            &self.cc,
            &self.subject,
            &self.email_text,
        ]
    }
}

/// Streaming CSV writer with CRLF row endings.
#[derive(Debug)]
pub struct CsvWriter<W> {
    inner: W,
}

impl<W: Write> CsvWriter<W> {
    /// Wraps a writer and writes the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = Self { inner };
        writer.write_record(CSV_HEADER)?;
        Ok(writer)
    }

    /// Writes one data row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn write_row(&mut self, row: &ExportRow) -> Result<()> {
        self.write_record(row.fields())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_record(&mut self, fields: [&str; 6]) -> Result<()> {
        let line = fields.map(csv_escape).join(",");
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\r\n")?;
        Ok(())
    }
}

/// Quotes a CSV field when it contains a comma, quote or line break.
#[must_use]
pub fn csv_escape(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Writes a header row and one row per record.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<W> {
    let mut csv = CsvWriter::new(writer)?;
    for row in rows {
        csv.write_row(row)?;
    }
    csv.finish()
}

/// Exports the mailbox to CSV in a fresh session.
///
/// # Errors
///
/// Returns an error if the session cannot be opened, the listing fails or
/// the output cannot be written.
pub async fn export_csv<W: Write>(
    config: &ServerConfig,
    credentials: &Credentials,
    options: &ExportOptions,
    writer: W,
) -> Result<ExportSummary> {
    let mut session = MailboxSession::open(config, credentials).await?;
    let result = export_session(&mut session, &credentials.address, options, writer).await;
    session.close().await;
    result
}

/// Exports over an open session, oldest message first.
///
/// # Errors
///
/// Returns an error if the listing or a message transfer fails, or the
/// output cannot be written. Messages the server refuses are skipped.
pub async fn export_session<S, W>(
    session: &mut MailboxSession<S>,
    account: &str,
    options: &ExportOptions,
    writer: W,
) -> Result<ExportSummary>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: Write,
{
    let ordinals = match options.limit {
        Some(limit) if limit > 0 => session.list_recent(limit).await?,
        _ => session.list().await?,
    };
    info!(
        messages = ordinals.len(),
        sent_only = options.sent_only,
        "Exporting mailbox"
    );

    let mut csv = CsvWriter::new(writer)?;
    let mut summary = ExportSummary::default();

    for ordinal in ordinals {
        let raw = match session.fetch(ordinal).await {
            Ok(raw) => raw,
            Err(e @ MailError::Fetch { .. }) => {
                warn!(ordinal, error = %e, "Skipping message");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let row = ExportRow::from_raw(&raw);
        summary.processed += 1;
        if options.sent_only && !row.is_from(account) {
            continue;
        }

        csv.write_row(&row)?;
        summary.exported += 1;
        debug!(ordinal, subject = %row.subject, "Exported message");
    }

    csv.finish()?;
    info!(
        processed = summary.processed,
        exported = summary.exported,
        skipped = summary.skipped,
        "Export finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
        assert_eq!(csv_escape(""), "");
    }

    #[test]
    fn test_write_csv() {
        let rows = vec![ExportRow {
            date: "Mon, 7 Jul 2025 10:00:00 +0000".into(),
            from: "Jane <jane@example.com>".into(),
            to: "bob@example.com".into(),
            cc: String::new(),
            subject: "Hi, there".into(),
            email_text: "Hello World !".into(),
        }];

        let out = write_csv(&rows, Vec::new()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Date,From,To,CC,Subject,Email_Text\r\n\
             \"Mon, 7 Jul 2025 10:00:00 +0000\",Jane <jane@example.com>,bob@example.com,,\"Hi, there\",Hello World !\r\n"
        );
    }

    #[test]
    fn test_row_from_raw() {
        let row = ExportRow::from_raw(
            b"From: =?UTF-8?Q?Ren=C3=A9?= <rene@example.com>\r\nCC: x@example.com\r\n\r\nHello\n\n  World\t!\r\n",
        );
        assert_eq!(row.from, "René <rene@example.com>");
        assert_eq!(row.cc, "x@example.com");
        assert_eq!(row.subject, "");
        assert_eq!(row.email_text, "Hello World !");
    }

    #[test]
    fn test_is_from() {
        let row = ExportRow {
            from: "Jane <JANE@Example.com>".into(),
            ..ExportRow::default()
        };
        assert!(row.is_from("jane@example.com"));
        assert!(!row.is_from("bob@example.com"));
    }
}
