//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the message path:
//! - Bus consume/commit/produce counters (recorded by the transports)
//! - Worker processing counters and latency
//!
//! Metrics are always recorded through the `metrics` facade; they are only
//! kept once a recorder is installed with [`MetricsExporter::install`]. The
//! HTTP adapter renders them on `GET /metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use courier_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! let text = exporter.render();
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder installer and renderer.
#[derive(Clone, Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter with no recorder installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs
    /// a warning and leaves [`handle`](Self::handle) empty.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if no recorder was installed by this exporter.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Bus metrics
    describe_counter!(
        "bus_messages_consumed_total",
        "Total number of messages received from the input topic"
    );
    describe_counter!(
        "bus_messages_committed_total",
        "Total number of messages acknowledged after successful handling"
    );
    describe_counter!(
        "bus_messages_failed_total",
        "Total number of messages left unacknowledged for retry"
    );
    describe_counter!(
        "bus_messages_skipped_total",
        "Total number of undecodable messages skipped"
    );
    describe_counter!(
        "bus_messages_produced_total",
        "Total number of messages enqueued for delivery"
    );
    describe_counter!(
        "bus_messages_delivered_total",
        "Total number of produced messages confirmed by the broker"
    );
    describe_counter!(
        "bus_delivery_failures_total",
        "Total number of produced messages the broker rejected"
    );
    describe_counter!(
        "bus_queue_full_total",
        "Total number of produce calls rejected by a full local queue"
    );
    describe_counter!(
        "bus_commit_failures_total",
        "Total number of failed offset commits"
    );
    describe_counter!(
        "bus_seek_failures_total",
        "Total number of failed rewinds to an unacknowledged message"
    );
    describe_counter!(
        "bus_consume_errors_total",
        "Total number of consumer receive errors"
    );

    // Worker metrics
    describe_counter!(
        "worker_messages_processed_total",
        "Total number of messages processed and answered"
    );
    describe_counter!(
        "worker_processor_failures_total",
        "Total number of processor failures"
    );
    describe_counter!(
        "worker_processor_timeouts_total",
        "Total number of processor calls that exceeded the handler timeout"
    );
    describe_histogram!(
        "worker_process_duration_seconds",
        "Time spent in the processor per message"
    );
}

/// Worker metrics helpers.
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Record a processor call.
    pub fn record_process(duration: Duration) {
        histogram!("worker_process_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a processed and answered message.
    pub fn record_processed() {
        counter!("worker_messages_processed_total").increment(1);
    }

    /// Record a processor failure.
    pub fn record_failure() {
        counter!("worker_processor_failures_total").increment(1);
    }

    /// Record a processor timeout.
    pub fn record_timeout() {
        counter!("worker_processor_timeouts_total").increment(1);
    }
}
