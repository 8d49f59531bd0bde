//! HTTP request handlers.

pub mod health;
pub mod message;
pub mod metrics;

pub use health::health_check;
pub use message::process_message;
pub use metrics::render_metrics;
