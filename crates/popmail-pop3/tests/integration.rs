//! Integration tests for the POP3 client.
//!
//! These tests script a server transcript with `tokio_test::io::Builder`;
//! the mock fails the test if the client writes anything unexpected.

use std::time::Duration;

use tokio_test::io::Builder;

use popmail_pop3::{Client, Error, ListEntry, StatInfo};

const GREETING: &[u8] = b"+OK POP3 server ready\r\n";

fn login_script(builder: &mut Builder) -> &mut Builder {
    builder
        .read(GREETING)
        .write(b"USER jane@example.com\r\n")
        .read(b"+OK send PASS\r\n")
        .write(b"PASS secret\r\n")
        .read(b"+OK maildrop locked and ready\r\n")
}

#[tokio::test]
async fn test_greeting() {
    let mock = Builder::new().read(GREETING).build();
    let client = Client::from_stream(mock).await.unwrap();
    assert_eq!(client.greeting(), "POP3 server ready");
}

#[tokio::test]
async fn test_negative_greeting() {
    let mock = Builder::new().read(b"-ERR too busy\r\n").build();
    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(msg) if msg.contains("too busy")));
}

#[tokio::test]
async fn test_login_list_retr_quit() {
    let mock = login_script(&mut Builder::new())
        .write(b"LIST\r\n")
        .read(b"+OK 3 messages\r\n1 120\r\n2 200\r\n3 95\r\n.\r\n")
        .write(b"RETR 2\r\n")
        .read(b"+OK 200 octets\r\n")
        .read(b"Subject: Dots\r\n\r\n..starts with a dot\r\nplain line\r\n.\r\n")
        .write(b"QUIT\r\n")
        .read(b"+OK bye\r\n")
        .build();

    let client = Client::with_timeout(mock, Duration::from_secs(30))
        .await
        .unwrap();
    let mut client = client.login("jane@example.com", "secret").await.unwrap();

    let listing = client.list().await.unwrap();
    assert_eq!(
        listing,
        vec![
            ListEntry { ordinal: 1, size: 120 },
            ListEntry { ordinal: 2, size: 200 },
            ListEntry { ordinal: 3, size: 95 },
        ]
    );

    let raw = client.retr(2).await.unwrap();
    assert_eq!(
        raw,
        b"Subject: Dots\r\n\r\n.starts with a dot\r\nplain line\r\n".to_vec()
    );

    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_empty_listing() {
    let mock = login_script(&mut Builder::new())
        .write(b"LIST\r\n")
        .read(b"+OK 0 messages\r\n.\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("jane@example.com", "secret").await.unwrap();
    assert!(client.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stat_and_noop() {
    let mock = login_script(&mut Builder::new())
        .write(b"STAT\r\n")
        .read(b"+OK 2 320\r\n")
        .write(b"NOOP\r\n")
        .read(b"+OK\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("jane@example.com", "secret").await.unwrap();

    assert_eq!(client.stat().await.unwrap(), StatInfo { count: 2, size: 320 });
    client.noop().await.unwrap();
}

#[tokio::test]
async fn test_rejected_password() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"USER jane@example.com\r\n")
        .read(b"+OK\r\n")
        .write(b"PASS wrong\r\n")
        .read(b"-ERR [AUTH] invalid password\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("jane@example.com", "wrong").await.unwrap_err();

    assert!(err.is_negative());
    assert!(matches!(err, Error::AuthenticationFailed(msg) if msg == "[AUTH] invalid password"));
}

#[tokio::test]
async fn test_rejected_user() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"USER nobody\r\n")
        .read(b"-ERR no such mailbox\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("nobody", "x").await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_retr_missing_message() {
    let mock = login_script(&mut Builder::new())
        .write(b"RETR 9\r\n")
        .read(b"-ERR no such message\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("jane@example.com", "secret").await.unwrap();

    let err = client.retr(9).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Negative { command: "RETR", ref message } if message == "no such message"
    ));
}

#[tokio::test]
async fn test_connection_dropped_mid_message() {
    let mock = login_script(&mut Builder::new())
        .write(b"RETR 1\r\n")
        .read(b"+OK\r\nSubject: cut\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("jane@example.com", "secret").await.unwrap();

    let err = client.retr(1).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
