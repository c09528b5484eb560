//! Mailbox sessions over POP3.
//!
//! A [`MailboxSession`] lives for one logical operation: open, list and
//! fetch, close. Sessions are never pooled or shared.

use popmail_pop3::connection::{connect, connect_tls};
use popmail_pop3::{Client, Connected, Pop3Stream, Transaction};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::{Credentials, Security, ServerConfig};
use crate::decoder::{MessageRecord, decode_message};
use crate::error::{MailError, Result};

/// An authenticated mailbox session.
#[derive(Debug)]
pub struct MailboxSession<S = Pop3Stream> {
    client: Client<S, Transaction>,
}

impl MailboxSession {
    /// Connects to the mailbox server and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Connectivity`] if the server cannot be reached,
    /// the TLS negotiation fails or the connect times out, and
    /// [`MailError::Authentication`] if the credentials are rejected.
    pub async fn open(config: &ServerConfig, credentials: &Credentials) -> Result<Self> {
        debug!(
            host = %config.host,
            port = config.port,
            security = config.security.display_name(),
            "Opening mailbox session"
        );

        let connecting = async {
            match config.security {
                Security::Tls => connect_tls(&config.host, config.port).await,
                Security::None | Security::StartTls => connect(&config.host, config.port).await,
            }
        };
        let stream = tokio::time::timeout(config.timeout, connecting)
            .await
            .map_err(|_| {
                MailError::Connectivity(format!(
                    "Timed out after {:?} connecting to {}:{}",
                    config.timeout, config.host, config.port
                ))
            })?
            .map_err(connectivity)?;

        let client = Client::with_timeout(stream, config.timeout)
            .await
            .map_err(connectivity)?;
        let client = if config.security == Security::StartTls {
            client.stls(&config.host).await.map_err(connectivity)?
        } else {
            client
        };

        Self::login(client, credentials).await
    }
}

impl<S> MailboxSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Logs in over an already connected stream.
    ///
    /// # Errors
    ///
    /// Same as [`MailboxSession::open`], minus the connect step.
    pub async fn from_stream(stream: S, credentials: &Credentials) -> Result<Self> {
        let client = Client::from_stream(stream).await.map_err(connectivity)?;
        Self::login(client, credentials).await
    }

    async fn login(client: Client<S, Connected>, credentials: &Credentials) -> Result<Self> {
        let client = client
            .login(&credentials.address, &credentials.secret)
            .await
            .map_err(|e| match e {
                popmail_pop3::Error::AuthenticationFailed(reason) => {
                    MailError::Authentication(reason)
                }
                other => connectivity(other),
            })?;

        info!(account = %credentials.address, "Mailbox session opened");
        Ok(Self { client })
    }

    /// Returns every message ordinal, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Connectivity`] if the listing fails.
    pub async fn list(&mut self) -> Result<Vec<u32>> {
        let mut ordinals: Vec<u32> = self
            .client
            .list()
            .await
            .map_err(connectivity)?
            .into_iter()
            .map(|entry| entry.ordinal)
            .collect();
        ordinals.sort_unstable();
        Ok(ordinals)
    }

    /// Returns the highest `limit` ordinals, ascending.
    ///
    /// Reverse the result for newest-first display.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Connectivity`] if the listing fails.
    pub async fn list_recent(&mut self, limit: usize) -> Result<Vec<u32>> {
        let mut ordinals = self.list().await?;
        let start = ordinals.len().saturating_sub(limit);
        Ok(ordinals.split_off(start))
    }

    /// Returns the number of messages in the maildrop.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Connectivity`] if STAT fails.
    pub async fn message_count(&mut self) -> Result<u32> {
        Ok(self.client.stat().await.map_err(connectivity)?.count)
    }

    /// Retrieves one raw message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Fetch`] if the server refuses the message with
    /// `-ERR`. Any other failure leaves the reply half-read, so it is
    /// reported as [`MailError::Connectivity`] and the session must not be
    /// used for further commands.
    pub async fn fetch(&mut self, ordinal: u32) -> Result<Vec<u8>> {
        self.client.retr(ordinal).await.map_err(|e| {
            if e.is_negative() {
                MailError::fetch(ordinal, e)
            } else {
                MailError::Connectivity(format!("Retrieving message {ordinal}: {e}"))
            }
        })
    }

    /// Fetches and decodes the newest `limit` messages, newest first.
    ///
    /// A message the server refuses or that cannot be decoded is logged
    /// and skipped. A broken transfer aborts the whole listing.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Connectivity`] if the listing or a transfer
    /// fails.
    pub async fn recent_records(&mut self, limit: usize) -> Result<Vec<MessageRecord>> {
        let ordinals = self.list_recent(limit).await?;
        let mut records = Vec::with_capacity(ordinals.len());

        for ordinal in ordinals.into_iter().rev() {
            let decoded = self
                .fetch(ordinal)
                .await
                .and_then(|raw| decode_message(ordinal, &raw));
            match decoded {
                Ok(record) => records.push(record),
                Err(e @ MailError::Fetch { .. }) => {
                    warn!(ordinal, error = %e, "Skipping message");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(count = records.len(), "Fetched recent messages");
        Ok(records)
    }

    /// Sends QUIT and drops the connection.
    ///
    /// Best effort: a failed QUIT is logged and otherwise ignored.
    pub async fn close(self) {
        match self.client.quit().await {
            Ok(()) => debug!("Mailbox session closed"),
            Err(e) => warn!(error = %e, "QUIT failed, dropping connection"),
        }
    }
}

/// Checks that the credentials are accepted.
///
/// # Errors
///
/// Returns [`MailError::Connectivity`] or [`MailError::Authentication`].
pub async fn verify_login(config: &ServerConfig, credentials: &Credentials) -> Result<()> {
    MailboxSession::open(config, credentials).await?.close().await;
    Ok(())
}

/// Fetches the newest `limit` messages, newest first, in a fresh session.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the listing fails.
pub async fn fetch_recent(
    config: &ServerConfig,
    credentials: &Credentials,
    limit: usize,
) -> Result<Vec<MessageRecord>> {
    let mut session = MailboxSession::open(config, credentials).await?;
    let result = session.recent_records(limit).await;
    session.close().await;
    result
}

/// Looks a message up by ordinal among the newest `window` messages.
///
/// This refetches the window in a new session. Ordinals are positions, not
/// identifiers: if the mailbox changed since the ordinal was listed, the
/// record returned can be a different message. Returns `None` when the
/// ordinal is outside the window.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the listing fails.
pub async fn find_message(
    config: &ServerConfig,
    credentials: &Credentials,
    ordinal: u32,
    window: usize,
) -> Result<Option<MessageRecord>> {
    let records = fetch_recent(config, credentials, window).await?;
    Ok(records.into_iter().find(|record| record.ordinal == ordinal))
}

fn connectivity(error: popmail_pop3::Error) -> MailError {
    MailError::Connectivity(error.to_string())
}
