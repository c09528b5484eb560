//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "popmail", author, version, about, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Override the default configuration file path
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Account address, also used as the login name
    #[arg(long, short, global = true, env = "POPMAIL_ADDRESS", value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Override the POP3 server host from the configuration
    #[arg(long, global = true, value_name = "HOST")]
    pub pop3_host: Option<String>,

    /// Override the SMTP server host from the configuration
    #[arg(long, global = true, value_name = "HOST")]
    pub smtp_host: Option<String>,

    /// Print results as JSON (list and show)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v info, -vv debug)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the account can log in
    Check,

    /// List the newest messages, newest first
    #[command(alias = "ls")]
    List {
        /// Number of messages to list (defaults to the configured inbox limit)
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show one message by its ordinal
    Show {
        /// Ordinal from the latest listing
        ordinal: u32,
    },

    /// Send a new message
    Send {
        /// Recipient address
        #[arg(long, short)]
        to: String,

        /// Subject line
        #[arg(long, short)]
        subject: String,

        #[command(flatten)]
        body: BodyArg,
    },

    /// Reply to a message by its ordinal
    Reply {
        /// Ordinal from the latest listing
        ordinal: u32,

        #[command(flatten)]
        body: BodyArg,
    },

    /// Export messages to a CSV file
    Export {
        /// Output file
        #[arg(long, short, default_value = "sent_items.csv", value_name = "FILE")]
        output: PathBuf,

        /// Only the newest N messages
        #[arg(long, short)]
        limit: Option<usize>,

        /// Export every message, not only those sent from the account
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
pub struct BodyArg {
    /// Message body; read from stdin when omitted
    #[arg(long, short)]
    pub body: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from([
            "popmail", "-vv", "--address", "me@example.com", "export", "--limit", "20", "--all",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.address.as_deref(), Some("me@example.com"));
        match cli.command {
            Command::Export { output, limit, all } => {
                assert_eq!(output, PathBuf::from("sent_items.csv"));
                assert_eq!(limit, Some(20));
                assert!(all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply() {
        let cli = Cli::try_parse_from(["popmail", "reply", "7", "--body", "thanks"]).unwrap();
        match cli.command {
            Command::Reply { ordinal, body } => {
                assert_eq!(ordinal, 7);
                assert_eq!(body.body.as_deref(), Some("thanks"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
