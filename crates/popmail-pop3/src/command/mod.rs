//! POP3 command builder.

use std::fmt;

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Name the mailbox
    User {
        /// Mailbox name
        username: String,
    },
    /// PASS - Mailbox password
    Pass {
        /// Password, never logged
        password: String,
    },
    /// STLS - Upgrade to TLS (RFC 2595)
    Stls,
    /// STAT - Message count and mailbox size
    Stat,
    /// LIST - Scan listing of every message
    List,
    /// RETR - Retrieve one message
    Retr {
        /// 1-based message number
        ordinal: u32,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - Enter the UPDATE state and close
    Quit,
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User { .. } => "USER",
            Self::Pass { .. } => "PASS",
            Self::Stls => "STLS",
            Self::Stat => "STAT",
            Self::List => "LIST",
            Self::Retr { .. } => "RETR",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(self.name().as_bytes());

        match self {
            Self::User { username } => {
                buf.push(b' ');
                buf.extend_from_slice(username.as_bytes());
            }
            Self::Pass { password } => {
                buf.push(b' ');
                buf.extend_from_slice(password.as_bytes());
            }
            Self::Retr { ordinal } => {
                buf.extend_from_slice(format!(" {ordinal}").as_bytes());
            }
            Self::Stls | Self::Stat | Self::List | Self::Noop | Self::Quit => {}
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { username } => f.debug_struct("User").field("username", username).finish(),
            Self::Pass { .. } => f
                .debug_struct("Pass")
                .field("password", &"<redacted>")
                .finish(),
            Self::Retr { ordinal } => f.debug_struct("Retr").field("ordinal", ordinal).finish(),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_pass() {
        let user = Command::User {
            username: "jane@example.com".into(),
        };
        assert_eq!(user.serialize(), b"USER jane@example.com\r\n");

        let pass = Command::Pass {
            password: "s3cret".into(),
        };
        assert_eq!(pass.serialize(), b"PASS s3cret\r\n");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::List.serialize(), b"LIST\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Stls.serialize(), b"STLS\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_retr() {
        assert_eq!(Command::Retr { ordinal: 42 }.serialize(), b"RETR 42\r\n");
    }

    #[test]
    fn test_debug_redacts_password() {
        let pass = Command::Pass {
            password: "hunter2".into(),
        };
        let debug = format!("{pass:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("redacted"));
        assert_eq!(format!("{:?}", Command::Stat), "STAT");
    }
}
