//! Line framing for the POP3 protocol.
//!
//! POP3 is line based: CRLF-terminated status lines, optionally followed
//! by a dot-terminated body. Every read and write is bounded by the
//! optional I/O timeout.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::parser::unstuff_line;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: u64 = 1024 * 1024;

/// Maximum multi-line body size.
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Buffered POP3 connection.
#[derive(Debug)]
pub struct FramedStream<S> {
    reader: BufReader<S>,
    timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            timeout,
        }
    }

    /// Returns the I/O timeout.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the underlying stream, dropping any buffered input.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    /// Reads one line with the trailing CRLF (or bare LF) removed.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, timeout, EOF or an overlong line.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let reader = &mut self.reader;
        let mut line = Vec::new();

        let read = with_timeout(timeout, async {
            let mut limited = reader.take(MAX_LINE_LENGTH);
            Ok(limited.read_until(b'\n', &mut line).await?)
        })
        .await?;

        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        if !line.ends_with(b"\n") {
            if read as u64 >= MAX_LINE_LENGTH {
                return Err(Error::Protocol("Line too long".into()));
            }
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-line",
            )));
        }

        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
        Ok(line)
    }

    /// Reads a dot-terminated body, unstuffing each line.
    ///
    /// Lines are returned joined with CRLF, each line terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be read or the body is too large.
    pub async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        loop {
            let line = self.read_line().await?;
            let Some(content) = unstuff_line(&line) else {
                break;
            };

            if body.len() + content.len() + 2 > MAX_BODY_SIZE {
                return Err(Error::Protocol(format!(
                    "Response body exceeds {MAX_BODY_SIZE} bytes"
                )));
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }

        Ok(body)
    }

    /// Writes and flushes data.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or timeout.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        with_timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await?;
            Ok(())
        })
        .await
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => fut.await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let mock = Builder::new().read(b"+OK ready\r\n-ERR bare lf\n").build();
        let mut framed = FramedStream::new(mock, None);

        assert_eq!(framed.read_line().await.unwrap(), b"+OK ready");
        assert_eq!(framed.read_line().await.unwrap(), b"-ERR bare lf");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mock = Builder::new().read(b"+OK partial").build();
        let mut framed = FramedStream::new(mock, None);

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_read_multiline_unstuffs() {
        let mock = Builder::new()
            .read(b"Subject: dots\r\n\r\n..hidden\r\n...\r\nend\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock, None);

        let body = framed.read_multiline().await.unwrap();
        assert_eq!(body, b"Subject: dots\r\n\r\n.hidden\r\n..\r\nend\r\n");
    }

    #[tokio::test]
    async fn test_read_multiline_split_across_reads() {
        let mock = Builder::new()
            .read(b"line one\r\nline t")
            .read(b"wo\r\n.")
            .read(b"\r\n")
            .build();
        let mut framed = FramedStream::new(mock, None);

        let body = framed.read_multiline().await.unwrap();
        assert_eq!(body, b"line one\r\nline two\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        let (client, _server) = tokio::io::duplex(64);
        let mut framed = FramedStream::new(client, Some(Duration::from_secs(5)));

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
    }
}
