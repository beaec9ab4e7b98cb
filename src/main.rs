//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `mcs_analytics` library for operating on
//! the durable store by hand:
//! - Listing batches waiting for a replay
//! - Replaying or purging them
//! - Sending a one-event test session to check credentials and connectivity
//!
//! All core functionality is implemented in the library crate.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mcs_analytics::config::{ACCEPTED_STATUS, DB_PATH, DEFAULT_TIMEOUT_SECS};
use mcs_analytics::delivery::{retry_durable_batches, DeliveryContext, DeliverySettings};
use mcs_analytics::initialization::{init_client, init_logger_with};
use mcs_analytics::transport::{HttpTransport, StaticAuthorization};
use mcs_analytics::{
    AnalyticsConfig, AnalyticsProxy, FailedBatchStore, LogFormat, LogLevel, Properties,
    SqliteBatchStore,
};

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Show batches waiting for a replay
/// mcs-analytics --backend my-backend pending
///
/// # Replay them against the collector
/// MCS_BASE_URL=https://mcs.example.com MCS_APPLICATION_KEY=key \
///     mcs-analytics --backend my-backend replay
///
/// # Send one test event
/// mcs-analytics --backend my-backend send-test-event --name smoke --property build=42
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "mcs-analytics",
    about = "Inspects and replays analytics batches kept for later delivery."
)]
struct Cli {
    /// Mobile backend identifier
    #[arg(long, env = "MCS_BACKEND_ID")]
    backend: String,

    /// Base URL of the mobile backend
    #[arg(long, env = "MCS_BASE_URL", default_value = "http://localhost:7201")]
    base_url: String,

    /// Application key registered with the backend
    #[arg(long, env = "MCS_APPLICATION_KEY", default_value = "")]
    application_key: String,

    /// Authorization header value (e.g. "Basic ..." or "Bearer ...")
    #[arg(long, env = "MCS_AUTHORIZATION", hide_env_values = true)]
    authorization: Option<String>,

    /// Database path (SQLite file)
    #[arg(long, env = "MCS_DB_PATH", value_parser, default_value = DB_PATH)]
    db_path: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_seconds: u64,

    /// Status code the collector answers for an accepted batch
    #[arg(long, default_value_t = ACCEPTED_STATUS)]
    accepted_status: u16,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List batches stored for the backend
    Pending,
    /// Resend stored batches once; batches that fail again stay stored
    Replay,
    /// Delete every stored batch of the backend
    Purge,
    /// Send a session with a single custom event
    SendTestEvent {
        /// Event name
        #[arg(long, default_value = "test_event")]
        name: String,

        /// Event property as key=value (repeatable)
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

impl Cli {
    fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            backend_id: self.backend.clone(),
            base_url: self.base_url.clone(),
            application_key: self.application_key.clone(),
            db_path: self.db_path.clone(),
            timeout_seconds: self.timeout_seconds,
            accepted_status: self.accepted_status,
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            ..Default::default()
        }
    }
}

async fn delivery_context(cli: &Cli, config: &AnalyticsConfig) -> Result<DeliveryContext> {
    let settings = DeliverySettings::from_config(config).context("Invalid configuration")?;
    let client = init_client(config).context("Failed to initialize HTTP client")?;
    let store = SqliteBatchStore::open(&config.db_path)
        .await
        .context("Failed to open durable store")?;
    let mut ctx = DeliveryContext::new(
        settings,
        Arc::new(HttpTransport::new(client)),
        Arc::new(store),
    );
    if let Some(authorization) = &cli.authorization {
        ctx = ctx.with_auth(Arc::new(StaticAuthorization::new(authorization.clone())));
    }
    Ok(ctx)
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.analytics_config();
    config.validate().context("Invalid configuration")?;

    match &cli.command {
        Command::Pending => {
            let store = SqliteBatchStore::open(&config.db_path)
                .await
                .context("Failed to open durable store")?;
            let records = store
                .fetch_records(&config.backend_id)
                .await
                .context("Failed to read stored batches")?;
            println!(
                "{} stored batch{} for backend {}",
                records.len(),
                if records.len() == 1 { "" } else { "es" },
                config.backend_id
            );
            for (index, record) in records.iter().enumerate() {
                let events = serde_json::from_str::<Vec<serde_json::Value>>(&record.payload)
                    .map(|batch| batch.len().to_string())
                    .unwrap_or_else(|_| "unreadable".to_string());
                println!("  #{}: {} events, {} bytes", index + 1, events, record.payload.len());
            }
        }
        Command::Replay => {
            let ctx = delivery_context(&cli, &config).await?;
            let report = retry_durable_batches(&ctx).await;
            println!(
                "Replayed {} batch{}: {} accepted, {} still stored",
                report.attempted,
                if report.attempted == 1 { "" } else { "es" },
                report.succeeded,
                report.remaining
            );
            if report.attempted > 0 && !report.purged {
                bail!("stored batches could not be purged after the replay");
            }
        }
        Command::Purge => {
            let store = SqliteBatchStore::open(&config.db_path)
                .await
                .context("Failed to open durable store")?;
            if !store.purge_all_for_backend(&config.backend_id).await {
                bail!("failed to purge stored batches for {}", config.backend_id);
            }
            println!("Purged stored batches for backend {}", config.backend_id);
        }
        Command::SendTestEvent { name, properties } => {
            let ctx = delivery_context(&cli, &config).await?;
            let proxy = AnalyticsProxy::new(&config, ctx);
            let properties = (!properties.is_empty())
                .then(|| properties.iter().cloned().collect::<Properties>());
            proxy.log_event(name, properties)?;
            let outcome = match proxy.end_session().await {
                Some(handle) => handle.wait().await,
                None => None,
            };
            proxy.shutdown().await;
            match outcome {
                Some(outcome) => println!("Flush finished: {outcome:?}"),
                None => bail!("flush did not complete"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    if let Err(e) = run(cli).await {
        eprintln!("mcs-analytics error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("build=42"),
            Ok(("build".to_string(), "42".to_string()))
        );
        assert_eq!(
            parse_property("url=a=b"),
            Ok(("url".to_string(), "a=b".to_string()))
        );
        assert!(parse_property("=x").is_err());
        assert!(parse_property("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "mcs-analytics",
            "--backend",
            "b1",
            "send-test-event",
            "--name",
            "smoke",
            "--property",
            "build=42",
        ])
        .unwrap();
        assert_eq!(cli.backend, "b1");
        assert_eq!(cli.analytics_config().backend_id, "b1");
        match cli.command {
            Command::SendTestEvent { name, properties } => {
                assert_eq!(name, "smoke");
                assert_eq!(properties, vec![("build".to_string(), "42".to_string())]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["mcs-analytics", "--backend", "b1"]).is_err());
    }
}
