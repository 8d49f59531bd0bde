//! # Courier Worker
//!
//! Application wiring shared by the Courier binaries:
//!
//! - `courier-worker`: long-running consume/process/produce worker
//! - `courier-mock-backend`: one request end-to-end through the in-memory bus
//! - `courier-http`: HTTP adapter over the same processor
//!
//! The business processor is an external collaborator; [`EchoProcessor`]
//! stands in for it so the binaries run out of the box.

pub mod bus;
pub mod echo;
pub mod mock_backend;
pub mod telemetry;

pub use bus::bus_from_settings;
pub use echo::EchoProcessor;
pub use mock_backend::{MockRequest, render_outputs, run_once};
pub use telemetry::{TelemetryConfig, init_metrics, init_tracing};
