//! Telemetry hub daemon.
//!
//! Runs a metrics registry and an event hub, and serves both over the
//! exporter until SIGINT or SIGTERM.

use std::path::PathBuf;

use clap::Parser;

use telemetry_hub::config::{load_config, TelemetryConfig};
use telemetry_hub::events::{Event, EventType};
use telemetry_hub::lifecycle::{signals, Telemetry};
use telemetry_hub::observability::init_logging;

#[derive(Parser)]
#[command(name = "telemetry-hub")]
#[command(about = "In-process telemetry hub with a metrics exporter", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };

    init_logging(&config.logging)?;
    tracing::info!("telemetry-hub v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Configuration loaded");
    }

    let telemetry = Telemetry::start(&config).await?;
    if let Some(addr) = telemetry.exporter_addr() {
        tracing::info!(address = %addr, "Exporter ready");
    }

    let session = format!("daemon-{}", std::process::id());
    telemetry
        .hub
        .publish(Event::new(EventType::SessionStarted).with_session(session.clone()));

    signals::wait_for_signal().await;

    telemetry
        .hub
        .publish(Event::new(EventType::SessionEnded).with_session(session));
    telemetry.shutdown().await;

    Ok(())
}
