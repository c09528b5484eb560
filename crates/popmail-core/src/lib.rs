//! # popmail-core
//!
//! Mail-access layer for `popmail`.
//!
//! This crate provides:
//! - Server configuration and credentials
//! - Mailbox sessions over POP3 (list, fetch, close)
//! - Message decoding (header fields, body selection, text cleanup)
//! - Outbound mail and reply derivation over SMTP
//! - CSV export
//!
//! Every operation opens its own connection and closes it before
//! returning. Nothing is cached between calls: configuration and
//! credentials are passed in each time.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod composer;
pub mod config;
pub mod decoder;
mod error;
pub mod export;
pub mod session;

pub use composer::{
    OutgoingMessage, SendOutcome, deliver, reply_address, reply_subject, send, try_send,
};
pub use config::{Credentials, MailConfig, Protocol, Security, ServerConfig, ServerConfigBuilder};
pub use decoder::{MessageRecord, clean_text, decode_header_field, decode_message, extract_body};
pub use error::{MailError, Result, SendStage};
pub use export::{ExportOptions, ExportRow, ExportSummary, export_csv, export_session, write_csv};
pub use session::{MailboxSession, fetch_recent, find_message, verify_login};
