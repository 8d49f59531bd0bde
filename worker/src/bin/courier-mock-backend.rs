//! Run one request end-to-end through the in-memory bus and print the output.

use anyhow::{Context, Result};
use clap::Parser;
use courier_core::BusSettings;
use courier_worker::{EchoProcessor, MockRequest, init_tracing, render_outputs, run_once};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "courier-mock-backend")]
#[command(about = "Run the mock backend end-to-end in memory")]
#[command(version)]
struct Cli {
    /// Text to send as request_text
    #[arg(long)]
    request_text: String,

    /// request_id header
    #[arg(long)]
    request_id: Option<String>,

    /// bot_id header (used as user_id)
    #[arg(long)]
    bot_id: Option<String>,

    /// chat_id header (used as session_id)
    #[arg(long)]
    chat_id: Option<String>,

    /// natal_chart header (JSON string or plain text)
    #[arg(long)]
    natal_chart: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = BusSettings::from_env().context("Invalid message bus settings")?;
    let request = MockRequest {
        request_text: cli.request_text,
        request_id: cli.request_id,
        bot_id: cli.bot_id,
        chat_id: cli.chat_id,
        natal_chart: cli.natal_chart,
    };

    let outputs = run_once(&settings, Arc::new(EchoProcessor), &request)
        .await
        .context("Mock run failed")?;
    println!("{}", render_outputs(&outputs).context("Failed to render output messages")?);
    Ok(())
}
