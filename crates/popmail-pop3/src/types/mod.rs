//! Core POP3 types.

mod listing;
mod response;

pub use listing::{ListEntry, StatInfo};
pub use response::{Response, Status};
