//! Terminal rendering of message records, and the export file.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::DateTime;
use popmail_core::MessageRecord;

const FROM_WIDTH: usize = 32;
const SUBJECT_WIDTH: usize = 60;

/// Formats an RFC 2822 date as `YYYY-MM-DD HH:MM`, or returns it as is.
pub fn short_date(raw: &str) -> String {
    DateTime::parse_from_rfc2822(raw.trim()).map_or_else(
        |_| raw.trim().to_string(),
        |date| date.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Cuts `text` to at most `width` characters, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// One line per record: ordinal, date, sender, subject.
pub fn listing(records: &[MessageRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let _ = writeln!(
            out,
            "{:>5}  {:<16}  {:<from$}  {}",
            record.ordinal,
            short_date(&record.date),
            truncate(&record.from, FROM_WIDTH),
            truncate(&record.subject, SUBJECT_WIDTH),
            from = FROM_WIDTH,
        );
    }
    out
}

/// Headers followed by the body.
pub fn detail(record: &MessageRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Date:    {}", record.date);
    let _ = writeln!(out, "From:    {}", record.from);
    let _ = writeln!(out, "To:      {}", record.to);
    if !record.cc.is_empty() {
        let _ = writeln!(out, "Cc:      {}", record.cc);
    }
    let _ = writeln!(out, "Subject: {}", record.subject);
    out.push('\n');
    out.push_str(record.body.trim_end());
    out.push('\n');
    out
}

/// An output file that is created on the first write.
///
/// Nothing touches the disk until the export has logged in and listed the
/// mailbox, so a failed login leaves no empty file behind.
#[derive(Debug)]
pub struct LazyFile {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl LazyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn file(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.file.is_none() {
            self.file = Some(BufWriter::new(File::create(&self.path)?));
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("output file not open"))
    }
}

impl io::Write for LazyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record() -> MessageRecord {
        MessageRecord {
            ordinal: 12,
            date: "Mon, 7 Jul 2025 10:05:00 +0200".into(),
            from: "Jane <jane@example.com>".into(),
            to: "me@example.com".into(),
            cc: String::new(),
            subject: "Lunch".into(),
            body: "See you\r\n\r\n".into(),
            message_id: "<m1@example.com>".into(),
        }
    }

    #[test]
    fn test_short_date() {
        assert_eq!(short_date("Mon, 7 Jul 2025 10:05:00 +0200"), "2025-07-07 10:05");
        assert_eq!(short_date(" yesterday "), "yesterday");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("déjà vu again", 5), "déjà…");
    }

    #[test]
    fn test_listing_line() {
        let out = listing(&[record()]);
        assert!(out.starts_with("   12  2025-07-07 10:05  Jane <jane@example.com>"));
        assert!(out.trim_end().ends_with("Lunch"));
    }

    #[test]
    fn test_detail_skips_empty_cc() {
        let out = detail(&record());
        assert!(!out.contains("Cc:"));
        assert!(out.ends_with("\n\nSee you\n"));
    }

    #[test]
    fn test_lazy_file_created_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_items.csv");

        let mut file = LazyFile::new(&path);
        file.flush().unwrap();
        assert!(!path.exists());

        file.write_all(b"Date,From\r\n").unwrap();
        file.flush().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"Date,From\r\n");
    }

    #[test]
    fn test_lazy_file_dropped_unused_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.csv");

        drop(LazyFile::new(&path));
        assert!(!path.exists());
    }
}
