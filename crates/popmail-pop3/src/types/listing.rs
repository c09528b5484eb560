//! Mailbox listing types.

/// Reply to STAT: message count and total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatInfo {
    /// Number of messages in the maildrop.
    pub count: u32,
    /// Size of the maildrop in octets.
    pub size: u64,
}

/// One line of a LIST scan listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListEntry {
    /// 1-based message number, valid for this session only.
    pub ordinal: u32,
    /// Message size in octets.
    pub size: u64,
}
