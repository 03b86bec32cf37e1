//! vigild — the Vigil health-check daemon.
//!
//! Assembles one monitor from a TOML config: a Kafka producer for the
//! report topic, an HTTP check against the monitored service's stats
//! endpoint, and the transformer change-detector validating the
//! snapshot. Runs until ctrl-c, then flushes and disconnects.
//!
//! # Usage
//!
//! ```text
//! vigild run --config /etc/vigil/vigild.toml
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use vigil_broker::{BrokerProducer, KafkaProducer};
use vigil_monitor::Monitor;
use vigil_rest::RestCheck;
use vigil_transform::TransformerValidator;

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "vigild", about = "Vigil health-check agent daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one monitor from a config file.
    Run {
        /// Path to the vigild TOML config.
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,vigild=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(&config).await,
    }
}

async fn run(path: &Path) -> anyhow::Result<()> {
    let config = DaemonConfig::from_file(path)?;

    let broker: Arc<dyn BrokerProducer> =
        Arc::new(KafkaProducer::new(&config.monitor.broker)?);
    let validator = Arc::new(TransformerValidator::new(
        &config.monitor.id,
        &config.monitor.name,
        config.check.transformer.clone(),
    ));
    let check = Arc::new(RestCheck::new(
        &config.monitor.id,
        &config.monitor.name,
        &config.check.api_url,
        Duration::from_millis(config.check.timeout_ms),
        validator,
    ));

    let monitor = Monitor::new(config.monitor, broker, check);

    // Joins the auto-start connect when one is already in flight.
    monitor.connect().await?;
    info!(monitor = %monitor.id(), "vigild running, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    monitor.disconnect().await?;
    Ok(())
}
