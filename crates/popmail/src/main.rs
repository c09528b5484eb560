//! `popmail` - read, send and export mail over POP3 and SMTP.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod output;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use popmail_core::{Credentials, ExportOptions, MailConfig, OutgoingMessage};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{BodyArg, Cli, Command};
use output::LazyFile;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let credentials = credentials(cli.address.as_deref())?;

    match cli.command {
        Command::Check => {
            popmail_core::verify_login(&config.pop3, &credentials).await?;
            println!("Login successful");
        }
        Command::List { limit } => {
            let limit = limit.unwrap_or(config.inbox_limit);
            let records = popmail_core::fetch_recent(&config.pop3, &credentials, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No messages");
            } else {
                print!("{}", output::listing(&records));
            }
        }
        Command::Show { ordinal } => {
            let record = find(&config, &credentials, ordinal).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print!("{}", output::detail(&record));
            }
        }
        Command::Send { to, subject, body } => {
            let message =
                OutgoingMessage::new(&credentials.address, to, subject, read_body(body)?);
            deliver(&config, &credentials, &message).await?;
        }
        Command::Reply { ordinal, body } => {
            let original = find(&config, &credentials, ordinal).await?;
            let message =
                OutgoingMessage::reply_to(&original, &credentials.address, read_body(body)?);
            deliver(&config, &credentials, &message).await?;
        }
        Command::Export { output, limit, all } => {
            let options = ExportOptions {
                limit,
                sent_only: !all,
            };
            let summary = popmail_core::export_csv(
                &config.pop3,
                &credentials,
                &options,
                LazyFile::new(&output),
            )
            .await
            .with_context(|| format!("Export to {} failed", output.display()))?;

            println!(
                "Exported {} of {} messages to {}",
                summary.exported,
                summary.processed,
                output.display()
            );
            if summary.skipped > 0 {
                println!("{} messages could not be read and were skipped", summary.skipped);
            }
        }
    }

    Ok(())
}

async fn find(
    config: &MailConfig,
    credentials: &Credentials,
    ordinal: u32,
) -> Result<popmail_core::MessageRecord> {
    let window = config.lookup_limit;
    popmail_core::find_message(&config.pop3, credentials, ordinal, window)
        .await?
        .with_context(|| format!("Message {ordinal} not found among the newest {window}"))
}

async fn deliver(
    config: &MailConfig,
    credentials: &Credentials,
    message: &OutgoingMessage,
) -> Result<()> {
    let outcome = popmail_core::send(&config.smtp, credentials, message).await;
    if !outcome.success {
        bail!(outcome.message);
    }
    println!("{}", outcome.message);
    Ok(())
}

/// Loads the configuration file and applies command-line overrides.
fn load_config(cli: &Cli) -> Result<MailConfig> {
    let mut config = match &cli.config {
        Some(path) => MailConfig::load(path)
            .with_context(|| format!("Cannot load configuration from {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                MailConfig::load(&path)
                    .with_context(|| format!("Cannot load configuration from {}", path.display()))?
            } else {
                debug!(path = %path.display(), "No configuration file, using defaults");
                MailConfig::default()
            }
        }
    };

    if let Some(host) = &cli.pop3_host {
        config.pop3.host.clone_from(host);
    }
    if let Some(host) = &cli.smtp_host {
        config.smtp.host.clone_from(host);
    }
    config.validate()?;

    info!(pop3 = %config.pop3.host, smtp = %config.smtp.host, "Configuration loaded");
    Ok(config)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("popmail")
        .join("config.toml")
}

fn credentials(address: Option<&str>) -> Result<Credentials> {
    let Some(address) = address.filter(|a| !a.trim().is_empty()) else {
        bail!("No account address; pass --address or set POPMAIL_ADDRESS");
    };

    let secret = match std::env::var("POPMAIL_PASSWORD") {
        Ok(secret) => secret,
        Err(_) => rpassword::prompt_password(format!("Password for {address}: "))
            .context("Cannot read password")?,
    };

    Ok(Credentials::new(address.trim(), secret))
}

fn read_body(arg: BodyArg) -> Result<String> {
    if let Some(body) = arg.body {
        return Ok(body);
    }

    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("Cannot read message body from stdin")?;
    Ok(body)
}
