//! POP3 connection management with type-state pattern.

mod client;
mod framed;
mod stream;

pub use client::{Client, Connected, Transaction};
pub use stream::{Pop3Stream, connect, connect_tls};
