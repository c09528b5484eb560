//! # popmail-mime
//!
//! MIME parsing and plain-text message generation.
//!
//! ## Features
//!
//! - **Message parsing**: lenient parser producing a tree of single and
//!   multipart bodies
//! - **Message generation**: single-part `text/plain` messages with reply
//!   threading headers
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//!   and charset conversion
//!
//! ## Quick Start
//!
//! ### Parsing MIME Messages
//!
//! ```
//! use popmail_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.subject(), Some("Test"));
//!
//! for leaf in message.leaves() {
//!     if leaf.content_type.is("text", "plain") && !leaf.is_attachment() {
//!         assert_eq!(leaf.decode_text().unwrap(), "Hello, World!");
//!     }
//! }
//! ```
//!
//! ### Building Messages
//!
//! ```
//! use popmail_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Re: Status update")
//!     .in_reply_to("<abc@example.com>")
//!     .references("<abc@example.com>")
//!     .text_body("Thanks!")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(message.headers.get("In-Reply-To"), Some("<abc@example.com>"));
//! ```
//!
//! ### Header Decoding
//!
//! ```
//! use popmail_mime::encoding::decode_rfc2047;
//!
//! assert_eq!(decode_rfc2047("=?iso-8859-1?Q?Caf=E9?="), "Café");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use builder::{ComposedMessage, MessageBuilder};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Leaf, Message, Part, TransferEncoding};
