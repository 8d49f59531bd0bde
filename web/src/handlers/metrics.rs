//! Prometheus scrape endpoint.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;

/// Render Prometheus metrics.
///
/// Responds `404` when no recorder was installed for this process.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().and_then(courier_runtime::MetricsExporter::render) {
        Some(rendered) => (StatusCode::OK, rendered),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
