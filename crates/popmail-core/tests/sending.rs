//! Outbound composer tests against an in-memory SMTP server.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use popmail_core::{Credentials, MailError, OutgoingMessage, SendOutcome, SendStage, deliver};

const TIMEOUT: Duration = Duration::from_secs(5);

/// What the fake server saw.
#[derive(Debug, Default)]
struct Transcript {
    commands: Vec<String>,
    data: Vec<String>,
}

/// Plays a submission server that accepts everything except, optionally,
/// the AUTH command.
async fn serve(stream: DuplexStream, accept_auth: bool) -> Transcript {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut transcript = Transcript::default();

    writer.write_all(b"220 mx.example.com ESMTP\r\n").await.unwrap();

    while let Some(line) = lines.next_line().await.unwrap() {
        transcript.commands.push(line.clone());
        let reply: &[u8] = match line.split_whitespace().next().unwrap_or_default() {
            "EHLO" => b"250-mx.example.com\r\n250-AUTH PLAIN LOGIN\r\n250 SIZE 100000\r\n",
            "AUTH" if accept_auth => b"235 2.7.0 Accepted\r\n",
            "AUTH" => b"535 5.7.8 Bad credentials\r\n",
            "MAIL" | "RCPT" => b"250 OK\r\n",
            "DATA" => {
                writer.write_all(b"354 Go ahead\r\n").await.unwrap();
                while let Some(data_line) = lines.next_line().await.unwrap() {
                    if data_line == "." {
                        break;
                    }
                    transcript.data.push(data_line);
                }
                b"250 2.0.0 Queued\r\n"
            }
            "QUIT" => {
                writer.write_all(b"221 Bye\r\n").await.unwrap();
                break;
            }
            _ => b"500 Unknown command\r\n",
        };
        writer.write_all(reply).await.unwrap();
    }

    transcript
}

fn credentials() -> Credentials {
    Credentials::new("me@example.com", "secret")
}

#[tokio::test]
async fn test_reply_transcript() {
    let (client_side, server_side) = tokio::io::duplex(4096);
    let server = tokio::spawn(serve(server_side, true));

    let message = OutgoingMessage::new(
        "me@example.com",
        "jane@example.com",
        "Re: Lunch",
        "Sounds good.\n.leading dot\nBye",
    )
    .in_reply_to("<m1@example.com>");

    deliver(client_side, TIMEOUT, &credentials(), &message)
        .await
        .unwrap();
    let transcript = server.await.unwrap();

    assert_eq!(transcript.commands[0], "EHLO localhost");
    assert!(transcript.commands[1].starts_with("AUTH PLAIN "));
    assert_eq!(transcript.commands[2], "MAIL FROM:<me@example.com>");
    assert_eq!(transcript.commands[3], "RCPT TO:<jane@example.com>");
    assert_eq!(transcript.commands[4], "DATA");
    assert_eq!(transcript.commands.last().map(String::as_str), Some("QUIT"));

    let data = &transcript.data;
    assert!(data.contains(&"From: me@example.com".to_string()));
    assert!(data.contains(&"To: jane@example.com".to_string()));
    assert!(data.contains(&"Subject: Re: Lunch".to_string()));
    assert!(data.contains(&"In-Reply-To: <m1@example.com>".to_string()));
    assert!(data.contains(&"References: <m1@example.com>".to_string()));
    assert!(data.contains(&"Content-Type: text/plain; charset=utf-8".to_string()));
    assert!(data.iter().any(|line| line.starts_with("Message-ID: <")));
    assert!(data.iter().any(|line| line.starts_with("Date: ")));

    // Body lines starting with a dot are stuffed on the wire
    assert!(data.contains(&"..leading dot".to_string()));
    assert_eq!(data.last().map(String::as_str), Some("Bye"));
}

#[tokio::test]
async fn test_plain_message_has_no_threading_headers() {
    let (client_side, server_side) = tokio::io::duplex(4096);
    let server = tokio::spawn(serve(server_side, true));

    let message = OutgoingMessage::new("me@example.com", "jane@example.com", "Hello", "Hi");
    deliver(client_side, TIMEOUT, &credentials(), &message)
        .await
        .unwrap();
    let transcript = server.await.unwrap();

    assert!(!transcript.data.iter().any(|l| l.starts_with("In-Reply-To:")));
    assert!(!transcript.data.iter().any(|l| l.starts_with("References:")));
}

#[tokio::test]
async fn test_rejected_auth_reports_stage() {
    let (client_side, server_side) = tokio::io::duplex(4096);
    let server = tokio::spawn(serve(server_side, false));

    let message = OutgoingMessage::new("me@example.com", "jane@example.com", "Hello", "Hi");
    let err = deliver(client_side, TIMEOUT, &credentials(), &message)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MailError::Send { stage: SendStage::Authentication, ref reason } if reason.contains("535")
    ));

    let outcome = SendOutcome::from(Err(err));
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Error sending email: "));

    // The client hangs up without QUIT; the server sees EOF
    let transcript = server.await.unwrap();
    assert_eq!(transcript.commands.len(), 2);
}
