//! Integration tests for the SMTP client.
//!
//! Each test scripts the server side of a submission session with
//! `tokio_test::io::Builder`.

use std::time::Duration;

use tokio_test::io::Builder;

use popmail_smtp::{Address, AuthMechanism, Client, Error, Extension, SmtpConnection};

const GREETING: &[u8] = b"220 mx.example.com ESMTP ready\r\n";

// "\0jane@example.com\0secret"
const PLAIN_TOKEN: &str = "AGphbmVAZXhhbXBsZS5jb20Ac2VjcmV0";

#[tokio::test]
async fn test_full_submission() {
    let message = b"From: jane@example.com\r\n\
        To: bob@example.com\r\n\
        Subject: Re: Lunch\r\n\
        In-Reply-To: <orig@example.com>\r\n\
        References: <orig@example.com>\r\n\
        \r\n\
        See you there.\r\n\
        .and a line with a leading dot\r\n";

    let mock = Builder::new()
        .read(GREETING)
        .write(b"EHLO client.local\r\n")
        .read(b"250-mx.example.com greets client.local\r\n250-SIZE 1000000\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n")
        .write(format!("AUTH PLAIN {PLAIN_TOKEN}\r\n").as_bytes())
        .read(b"235 2.7.0 Authentication successful\r\n")
        .write(b"MAIL FROM:<jane@example.com>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<bob@example.com>\r\n")
        .read(b"250 OK\r\n")
        .write(b"DATA\r\n")
        .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
        .write(
            b"From: jane@example.com\r\n\
            To: bob@example.com\r\n\
            Subject: Re: Lunch\r\n\
            In-Reply-To: <orig@example.com>\r\n\
            References: <orig@example.com>\r\n\
            \r\n\
            See you there.\r\n\
            ..and a line with a leading dot\r\n\
            .\r\n",
        )
        .read(b"250 2.0.0 queued as ABC123\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 2.0.0 Bye\r\n")
        .build();

    let client = Client::with_timeout(mock, Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(client.server_info().hostname, "mx.example.com");

    let client = client.ehlo("client.local").await.unwrap();
    let info = client.server_info();
    assert_eq!(info.max_message_size(), Some(1_000_000));
    assert!(info.supports(&Extension::EightBitMime));
    assert_eq!(info.preferred_auth(), AuthMechanism::Plain);

    let client = client
        .authenticate("jane@example.com", "secret")
        .await
        .unwrap();
    let client = client
        .mail_from(Address::new("jane@example.com").unwrap())
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("bob@example.com").unwrap())
        .await
        .unwrap();
    let client = client.data().await.unwrap();
    let client = client.send_message(message).await.unwrap();
    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_login_fallback() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"EHLO client.local\r\n")
        .read(b"250-mx.example.com\r\n250 AUTH LOGIN\r\n")
        .write(b"AUTH LOGIN\r\n")
        .read(b"334 VXNlcm5hbWU6\r\n")
        .write(b"amFuZUBleGFtcGxlLmNvbQ==\r\n")
        .read(b"334 UGFzc3dvcmQ6\r\n")
        .write(b"c2VjcmV0\r\n")
        .read(b"235 Authenticated\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("client.local").await.unwrap();
    assert_eq!(client.server_info().preferred_auth(), AuthMechanism::Login);
    client
        .authenticate("jane@example.com", "secret")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_authentication_rejected() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"EHLO client.local\r\n")
        .read(b"250-mx.example.com\r\n250 AUTH PLAIN\r\n")
        .write(format!("AUTH PLAIN {PLAIN_TOKEN}\r\n").as_bytes())
        .read(b"535 5.7.8 Authentication credentials invalid\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("client.local").await.unwrap();
    let err = client
        .authenticate("jane@example.com", "secret")
        .await
        .unwrap_err();

    assert!(err.is_permanent());
    assert!(matches!(err, Error::SmtpError { code: 535, .. }));
}

#[tokio::test]
async fn test_recipient_rejected() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"EHLO client.local\r\n")
        .read(b"250 mx.example.com\r\n")
        .write(b"MAIL FROM:<jane@example.com>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<nobody@example.com>\r\n")
        .read(b"550 5.1.1 No such user\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("client.local").await.unwrap();
    let client = client
        .mail_from(Address::new("jane@example.com").unwrap())
        .await
        .unwrap();
    let err = client
        .rcpt_to(Address::new("nobody@example.com").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SmtpError { code: 550, ref message } if message == "5.1.1 No such user"));
}

#[tokio::test]
async fn test_message_over_size_limit() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"EHLO client.local\r\n")
        .read(b"250-mx.example.com\r\n250 SIZE 16\r\n")
        .write(b"MAIL FROM:<jane@example.com>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<bob@example.com>\r\n")
        .read(b"250 OK\r\n")
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("client.local").await.unwrap();
    let client = client
        .mail_from(Address::new("jane@example.com").unwrap())
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("bob@example.com").unwrap())
        .await
        .unwrap();
    let client = client.data().await.unwrap();

    let err = client
        .send_message(b"Subject: too long for this server\r\n\r\nbody\r\n")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MessageTooLarge { limit: 16, .. }));
}

#[tokio::test]
async fn test_unavailable_greeting() {
    let mock = Builder::new()
        .read(b"421 4.3.2 Service not available\r\n")
        .build();

    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(err.is_transient());
}
