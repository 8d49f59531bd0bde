//! Axum HTTP adapter for Courier.
//!
//! Exposes the same [`Processor`](courier_core::Processor) the bus worker uses
//! over HTTP, for synchronous callers and local testing.
//!
//! # Routes
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /`, `GET /health` | liveness, plain `ok` |
//! | `POST /` | text or JSON body in, `{"response_text": ...}` out |
//! | `GET /metrics` | Prometheus text, when a recorder is installed |
//!
//! # Example
//!
//! ```ignore
//! use courier_web::{AppState, WebConfig, serve};
//!
//! let state = AppState::new(processor);
//! serve(&WebConfig::from_env(), state).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::get;
use courier_runtime::shutdown_signal;
use tower_http::trace::TraceLayer;

pub use config::WebConfig;
pub use handlers::message::MessageResponse;
pub use state::AppState;

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health_check).post(handlers::process_message))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::render_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `config` and serve until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound or serving fails.
pub async fn serve(config: &WebConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(address = %config.addr(), "HTTP adapter listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP adapter stopped");
    Ok(())
}
