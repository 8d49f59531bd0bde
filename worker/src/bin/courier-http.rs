//! HTTP adapter over the Courier processor.

use anyhow::{Context, Result};
use clap::Parser;
use courier_core::BusSettings;
use courier_web::{AppState, WebConfig, serve};
use courier_worker::{EchoProcessor, TelemetryConfig, init_metrics, init_tracing};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "courier-http")]
#[command(about = "Run the text/JSON HTTP server")]
#[command(version)]
struct Cli {
    /// Host interface to bind (default: HTTP_HOST or 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (default: HTTP_PORT or 8000)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = WebConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let settings = BusSettings::from_env().context("Invalid message bus settings")?;
    let mut state = AppState::new(Arc::new(EchoProcessor)).with_handler_timeout(settings.handler_timeout);
    if let Some(exporter) = init_metrics(&TelemetryConfig::from_env()).context("Failed to initialize metrics")? {
        state = state.with_metrics(exporter);
    }

    serve(&config, state).await.context("HTTP server failed")?;
    Ok(())
}
