//! Outbound mail over SMTP, including replies.

use std::time::Duration;

use popmail_mime::{ComposedMessage, MessageBuilder};
use popmail_smtp::connection::{connect, connect_tls};
use popmail_smtp::{Address, Client, Connected};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::{Credentials, Security, ServerConfig};
use crate::decoder::MessageRecord;
use crate::error::{MailError, Result, SendStage};

/// Name sent with EHLO.
const EHLO_NAME: &str = "localhost";

/// A plain-text message to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// `Message-ID` of the message being answered.
    pub in_reply_to: Option<String>,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            in_reply_to: None,
        }
    }

    /// Marks the message as a reply to the given `Message-ID`.
    ///
    /// An empty id is ignored.
    #[must_use]
    pub fn in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        let id = message_id.into();
        self.in_reply_to = (!id.trim().is_empty()).then_some(id);
        self
    }

    /// Builds a reply to a fetched message.
    #[must_use]
    pub fn reply_to(original: &MessageRecord, from: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(
            from,
            reply_address(&original.from),
            reply_subject(&original.subject),
            body,
        )
        .in_reply_to(original.message_id.clone())
    }

    fn compose(&self) -> Result<ComposedMessage> {
        let mut builder = MessageBuilder::new()
            .from(&self.from)
            .to(&self.to)
            .subject(&self.subject)
            .text_body(&self.body);
        if let Some(id) = &self.in_reply_to {
            builder = builder.in_reply_to(id).references(id);
        }
        builder
            .build()
            .map_err(|e| MailError::send(SendStage::Compose, e))
    }
}

/// Subject for a reply: `Re: ` is prepended unless the subject already
/// starts with `Re:` (case-sensitive).
#[must_use]
pub fn reply_subject(original: &str) -> String {
    if original.starts_with("Re:") {
        original.to_string()
    } else {
        format!("Re: {original}")
    }
}

/// Address to reply to.
///
/// Takes the text inside the first `<...>` pair of a `Name <address>`
/// field; a field without one is returned unchanged. This is a heuristic,
/// not an address parser.
#[must_use]
pub fn reply_address(from: &str) -> String {
    from.match_indices('<')
        .find_map(|(start, _)| {
            let line = from[start + 1..].split('\n').next().unwrap_or_default();
            let first = line.chars().next()?;
            let close = line[first.len_utf8()..].find('>')? + first.len_utf8();
            Some(line[..close].to_string())
        })
        .unwrap_or_else(|| from.to_string())
}

/// Outcome of a send, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// Whether the server accepted the message.
    pub success: bool,
    /// Human-readable result.
    pub message: String,
}

impl From<Result<()>> for SendOutcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                message: "Email sent successfully".to_string(),
            },
            Err(MailError::Send {
                stage: SendStage::Connect,
                reason,
            }) => Self {
                success: false,
                message: format!("Failed to connect to SMTP server: {reason}"),
            },
            Err(MailError::Send { reason, .. }) => Self {
                success: false,
                message: format!("Error sending email: {reason}"),
            },
            Err(e) => Self {
                success: false,
                message: format!("Error sending email: {e}"),
            },
        }
    }
}

/// Sends a message, reporting every failure in the outcome.
pub async fn send(
    config: &ServerConfig,
    credentials: &Credentials,
    message: &OutgoingMessage,
) -> SendOutcome {
    let result = try_send(config, credentials, message).await;
    match &result {
        Ok(()) => info!(to = %message.to, "Message sent"),
        Err(e) => warn!(to = %message.to, error = %e, "Message not sent"),
    }
    result.into()
}

/// Sends a message over a new SMTP connection.
///
/// # Errors
///
/// Returns [`MailError::InvalidAddress`] if an address cannot be used, or
/// [`MailError::Send`] naming the stage that failed.
pub async fn try_send(
    config: &ServerConfig,
    credentials: &Credentials,
    message: &OutgoingMessage,
) -> Result<()> {
    let envelope = Envelope::new(message)?;
    let composed = message.compose()?;

    debug!(host = %config.host, port = config.port, "Connecting to SMTP server");
    let connecting = async {
        match config.security {
            Security::Tls => connect_tls(&config.host, config.port).await,
            Security::None | Security::StartTls => connect(&config.host, config.port).await,
        }
    };
    let stream = tokio::time::timeout(config.timeout, connecting)
        .await
        .map_err(|_| {
            MailError::send(
                SendStage::Connect,
                format!("timed out after {:?}", config.timeout),
            )
        })?
        .map_err(|e| MailError::send(SendStage::Connect, e))?;

    let client = greet(stream, config.timeout).await?;
    let client = if config.security == Security::StartTls {
        client
            .starttls(&config.host)
            .await
            .map_err(|e| MailError::send(SendStage::StartTls, e))?
    } else {
        client
    };

    submit(client, credentials, &envelope, &composed).await
}

/// Sends a message over an already connected stream, without STARTTLS.
///
/// # Errors
///
/// Same as [`try_send`], minus the connect and STARTTLS stages.
pub async fn deliver<S>(
    stream: S,
    timeout: Duration,
    credentials: &Credentials,
    message: &OutgoingMessage,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let envelope = Envelope::new(message)?;
    let composed = message.compose()?;
    let client = greet(stream, timeout).await?;
    submit(client, credentials, &envelope, &composed).await
}

struct Envelope {
    from: Address,
    to: Address,
}

impl Envelope {
    fn new(message: &OutgoingMessage) -> Result<Self> {
        let address = |value: &str| {
            Address::new(value).map_err(|e| MailError::InvalidAddress(e.to_string()))
        };
        Ok(Self {
            from: address(&message.from)?,
            to: address(&message.to)?,
        })
    }
}

async fn greet<S>(stream: S, timeout: Duration) -> Result<Client<S, Connected>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client = Client::with_timeout(stream, timeout)
        .await
        .map_err(|e| MailError::send(SendStage::Greeting, e))?;
    client
        .ehlo(EHLO_NAME)
        .await
        .map_err(|e| MailError::send(SendStage::Greeting, e))
}

async fn submit<S>(
    client: Client<S, Connected>,
    credentials: &Credentials,
    envelope: &Envelope,
    message: &ComposedMessage,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client = client
        .authenticate(&credentials.address, &credentials.secret)
        .await
        .map_err(|e| MailError::send(SendStage::Authentication, e))?;

    let client = client
        .mail_from(envelope.from.clone())
        .await
        .map_err(|e| MailError::send(SendStage::Envelope, e))?;
    let client = client
        .rcpt_to(envelope.to.clone())
        .await
        .map_err(|e| MailError::send(SendStage::Envelope, e))?;

    let client = client
        .data()
        .await
        .map_err(|e| MailError::send(SendStage::Transmit, e))?;
    let client = client
        .send_message(&message.to_bytes())
        .await
        .map_err(|e| MailError::send(SendStage::Transmit, e))?;

    // The message is accepted at this point; a failed QUIT does not undo it
    if let Err(e) = client.quit().await {
        warn!(error = %e, "QUIT failed after the message was accepted");
    }
    Ok(())
}
