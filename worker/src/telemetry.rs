//! Logging and metrics initialization for the binaries.

use courier_runtime::{MetricsError, MetricsExporter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "courier_worker=info,courier_runtime=info,courier_redpanda=info,courier_testing=info,courier_web=info,tower_http=info";

/// Observability switches.
///
/// | Variable | Default |
/// |---|---|
/// | `METRICS_ENABLED` | `false` |
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Install the Prometheus recorder
    pub metrics_enabled: bool,
}

impl TelemetryConfig {
    /// Load from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for variable access.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            metrics_enabled: lookup("METRICS_ENABLED").is_some_and(|v| parse_flag(&v)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Install the global tracing subscriber (`RUST_LOG`, fmt layer).
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder when enabled.
///
/// # Errors
///
/// Returns [`MetricsError`] if the recorder cannot be installed.
pub fn init_metrics(config: &TelemetryConfig) -> Result<Option<MetricsExporter>, MetricsError> {
    if !config.metrics_enabled {
        return Ok(None);
    }
    let mut exporter = MetricsExporter::new();
    exporter.install()?;
    Ok(Some(exporter))
}
