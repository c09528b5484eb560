//! # popmail-pop3
//!
//! An async POP3 client library implementing RFC 1939.
//!
//! ## Features
//!
//! - **Type-state connection management**: AUTHORIZATION and TRANSACTION
//!   commands are only callable in the matching state
//! - **Commands**: USER, PASS, STAT, LIST, RETR, NOOP, QUIT
//! - **TLS support**: implicit TLS (port 995) and STLS (RFC 2595)
//! - **Timeouts**: optional per-read/per-write deadline
//!
//! ## Quick Start
//!
//! ```ignore
//! use popmail_pop3::Client;
//! use popmail_pop3::connection::connect_tls;
//!
//! #[tokio::main]
//! async fn main() -> popmail_pop3::Result<()> {
//!     let stream = connect_tls("pop.example.com", 995).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let mut client = client.login("user@example.com", "password").await?;
//!
//!     for entry in client.list().await? {
//!         let raw = client.retr(entry.ordinal).await?;
//!         println!("message {} is {} bytes", entry.ordinal, raw.len());
//!     }
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐                      ┌──────────────┐
//! │  Connected   │ ─── login() ───────→ │ Transaction  │ ─── quit()
//! └──────────────┘                      └──────────────┘
//!        │ stls()                          stat/list/retr/noop
//!        └──→ Connected (TLS)
//! ```
//!
//! Message ordinals are only valid for the session that listed them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Client, Connected, Pop3Stream, Transaction};
pub use error::{Error, Result};
pub use types::{ListEntry, Response, StatInfo, Status};

/// Default port for plaintext POP3.
pub const DEFAULT_PORT: u16 = 110;

/// Default port for POP3 over implicit TLS.
pub const DEFAULT_TLS_PORT: u16 = 995;
