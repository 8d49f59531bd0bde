//! Application state for Axum handlers.

use courier_core::Processor;
use courier_runtime::MetricsExporter;
use std::sync::Arc;
use std::time::Duration;

/// State shared across all HTTP handlers.
///
/// Holds the same [`Processor`] the bus worker uses, so both entry points
/// answer identically.
#[derive(Clone)]
pub struct AppState {
    processor: Arc<dyn Processor>,
    metrics: Option<MetricsExporter>,
    handler_timeout: Option<Duration>,
}

impl AppState {
    /// Create state around `processor`.
    #[must_use]
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        Self {
            processor,
            metrics: None,
            handler_timeout: None,
        }
    }

    /// Serve metrics rendered by `exporter` on `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, exporter: MetricsExporter) -> Self {
        self.metrics = Some(exporter);
        self
    }

    /// Bound every processor call.
    #[must_use]
    pub const fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// The shared processor.
    #[must_use]
    pub fn processor(&self) -> &dyn Processor {
        self.processor.as_ref()
    }

    /// Metrics exporter, if metrics are enabled.
    #[must_use]
    pub const fn metrics(&self) -> Option<&MetricsExporter> {
        self.metrics.as_ref()
    }

    /// Processor timeout, if any.
    #[must_use]
    pub const fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout
    }
}
