//! Type-state POP3 client.
//!
//! RFC 1939 sessions move through two client-visible states:
//!
//! - `Connected`: AUTHORIZATION state, after the greeting
//! - `Transaction`: after a successful USER/PASS exchange
//!
//! Each state only exposes the commands valid in it. `quit` is available
//! in both.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Pop3Stream;
use super::framed::FramedStream;
use crate::command::Command;
use crate::parser::{parse_list_entry, parse_stat, parse_status_line};
use crate::types::{ListEntry, Response, StatInfo};
use crate::{Error, Result};

/// Type-state marker for the AUTHORIZATION state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Connected;

/// Type-state marker for the TRANSACTION state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transaction;

/// POP3 client with type-state.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: FramedStream<S>,
    greeting: String,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Sends QUIT and closes the session.
    ///
    /// From the TRANSACTION state this commits deletions (none are ever
    /// issued by this client).
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT cannot be sent or is refused.
    pub async fn quit(mut self) -> Result<()> {
        self.command(&Command::Quit).await?;
        Ok(())
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            greeting: self.greeting,
            _state: PhantomData,
        }
    }

    /// Sends a command and reads its status line.
    ///
    /// A `-ERR` reply becomes [`Error::Negative`].
    async fn command(&mut self, cmd: &Command) -> Result<Response> {
        debug!(command = cmd.name(), "Sending POP3 command");
        self.stream.write_all(&cmd.serialize()).await?;

        let line = self.stream.read_line().await?;
        let response = parse_status_line(&line)?;
        if !response.is_ok() {
            debug!(command = cmd.name(), reply = %response.text, "POP3 command refused");
            return Err(Error::negative(cmd.name(), response.text));
        }
        Ok(response)
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or it is `-ERR`.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::start(FramedStream::new(stream, None)).await
    }

    /// Like [`Client::from_stream`], bounding every read and write by
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or it is `-ERR`.
    pub async fn with_timeout(stream: S, timeout: Duration) -> Result<Self> {
        Self::start(FramedStream::new(stream, Some(timeout))).await
    }

    async fn start(mut stream: FramedStream<S>) -> Result<Self> {
        let line = stream.read_line().await?;
        let greeting = parse_status_line(&line)?;
        if !greeting.is_ok() {
            return Err(Error::Protocol(format!(
                "Server refused connection: {}",
                greeting.text
            )));
        }
        debug!(greeting = %greeting.text, "POP3 greeting received");

        Ok(Self {
            stream,
            greeting: greeting.text,
            _state: PhantomData,
        })
    }

    /// Authenticates with USER/PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the server rejects either
    /// command, or another error if the exchange itself fails.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Transaction>> {
        for cmd in [
            Command::User {
                username: username.to_string(),
            },
            Command::Pass {
                password: password.to_string(),
            },
        ] {
            match self.command(&cmd).await {
                Ok(_) => {}
                Err(Error::Negative { message, .. }) => {
                    return Err(Error::AuthenticationFailed(message));
                }
                Err(e) => return Err(e),
            }
        }

        debug!(username, "POP3 login accepted");
        Ok(self.transition())
    }
}

impl Client<Pop3Stream, Connected> {
    /// Upgrades the connection to TLS using STLS (RFC 2595).
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses STLS or the handshake fails.
    pub async fn stls(mut self, host: &str) -> Result<Self> {
        self.command(&Command::Stls).await?;

        let timeout = self.stream.timeout();
        let stream = self.stream.into_inner().upgrade_to_tls(host).await?;
        debug!(host, "POP3 connection upgraded to TLS");

        Ok(Self {
            stream: FramedStream::new(stream, timeout),
            greeting: self.greeting,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and maildrop size.
    ///
    /// # Errors
    ///
    /// Returns an error if STAT fails or its reply is malformed.
    pub async fn stat(&mut self) -> Result<StatInfo> {
        let response = self.command(&Command::Stat).await?;
        parse_stat(&response.text)
    }

    /// Returns the scan listing of every message, in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if LIST fails or an entry is malformed.
    pub async fn list(&mut self) -> Result<Vec<ListEntry>> {
        self.command(&Command::List).await?;
        let body = self.stream.read_multiline().await?;

        body.split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(parse_list_entry)
            .collect()
    }

    /// Retrieves one message, dot-unstuffed, with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Negative`] if the server has no such message, or
    /// another error if the transfer fails.
    pub async fn retr(&mut self, ordinal: u32) -> Result<Vec<u8>> {
        self.command(&Command::Retr { ordinal }).await?;
        let message = self.stream.read_multiline().await?;
        debug!(ordinal, bytes = message.len(), "POP3 message retrieved");
        Ok(message)
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if NOOP fails.
    pub async fn noop(&mut self) -> Result<()> {
        self.command(&Command::Noop).await?;
        Ok(())
    }
}
