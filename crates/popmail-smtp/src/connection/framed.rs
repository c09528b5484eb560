//! Line framing for SMTP replies.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::Reply;

/// Maximum reply line length. RFC 5321 allows 512; servers exceed it.
const MAX_LINE_LENGTH: u64 = 64 * 1024;

/// Maximum number of lines in one reply.
const MAX_REPLY_LINES: usize = 256;

/// Buffered SMTP connection with an optional I/O deadline.
#[derive(Debug)]
pub struct FramedStream<S> {
    reader: BufReader<S>,
    timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            reader: BufReader::new(stream),
            timeout,
        }
    }

    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    /// Reads a complete, possibly multi-line, reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(Error::Protocol("Reply has too many lines".into()));
            }
        }

        parse_reply(&lines)
    }

    async fn read_line(&mut self) -> Result<String> {
        let reader = &mut self.reader;
        let mut line = Vec::new();

        let read = with_timeout(self.timeout, async {
            Ok(reader.take(MAX_LINE_LENGTH).read_until(b'\n', &mut line).await?)
        })
        .await?;

        if read == 0 || !line.ends_with(b"\n") {
            if read as u64 >= MAX_LINE_LENGTH {
                return Err(Error::Protocol("Reply line too long".into()));
            }
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }

        Ok(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Writes and flushes data.
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
    async fn test_read_multiline_reply() {
        let mock = Builder::new()
            .read(b"250-mx.example.com\r\n250-SIZE 1000")
            .read(b"\r\n250 AUTH PLAIN\r\n")
            .build();
        let mut framed = FramedStream::new(mock, None);

        let reply = framed.read_reply().await.unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["mx.example.com", "SIZE 1000", "AUTH PLAIN"]);
    }

    #[tokio::test]
    async fn test_read_reply_eof() {
        let mock = Builder::new().read(b"250-partial\r\n").build();
        let mut framed = FramedStream::new(mock, None);

        let err = framed.read_reply().await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        let (client, _server) = tokio::io::duplex(64);
        let mut framed = FramedStream::new(client, Some(Duration::from_secs(5)));

        let err = framed.read_reply().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
    }
}
