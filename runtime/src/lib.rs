//! # Courier Runtime
//!
//! Worker runtime for Courier.
//!
//! This crate provides the [`Worker`] that drives a
//! [`MessageBus`](courier_core::MessageBus) through the consume, process and
//! produce loop.
//!
//! ## Core Components
//!
//! - **Worker**: consume loop orchestration, response production, lifecycle
//! - **Context**: merges transport metadata, payload metadata and identifier
//!   headers into the processor context
//! - **Lifecycle**: SIGINT/SIGTERM handling
//! - **Metrics**: Prometheus recorder and worker metrics
//!
//! ## Example
//!
//! ```ignore
//! use courier_runtime::Worker;
//!
//! let worker = Worker::new(bus, processor, settings).with_max_messages(10);
//! worker.run().await?;
//! ```

/// Processor context assembly
pub mod context;

/// Signal handling
pub mod lifecycle;

/// Prometheus metrics for observability
pub mod metrics;

/// Consume/process/produce worker
pub mod worker;

pub use context::{merge_context, response_headers};
pub use lifecycle::shutdown_signal;
pub use metrics::{MetricsError, MetricsExporter};
pub use worker::{Worker, WorkerHandle, WorkerState};
