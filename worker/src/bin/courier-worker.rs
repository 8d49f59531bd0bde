//! Long-running consume/process/produce worker.

use anyhow::{Context, Result};
use clap::Parser;
use courier_core::BusSettings;
use courier_runtime::Worker;
use courier_worker::{EchoProcessor, TelemetryConfig, bus_from_settings, init_metrics, init_tracing};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "courier-worker")]
#[command(about = "Consume messages, process them and produce the responses")]
#[command(version)]
struct Cli {
    /// Stop after this many processed messages (useful for tests)
    #[arg(long)]
    max_messages: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let _metrics = init_metrics(&TelemetryConfig::from_env()).context("Failed to initialize metrics")?;
    let settings = BusSettings::from_env().context("Invalid message bus settings")?;
    tracing::info!(settings = ?settings, "Configuration loaded");

    let bus = bus_from_settings(&settings);
    let mut worker = Worker::new(bus, Arc::new(EchoProcessor), settings);
    if let Some(max) = cli.max_messages {
        worker = worker.with_max_messages(max);
    }

    worker.run().await.context("Worker failed")?;
    Ok(())
}
