//! One request end-to-end through the in-memory bus.
//!
//! Mirrors a full bus round trip without a broker: the request is enqueued as
//! `{"request_text": ...}` with identifier headers, a worker bounded to one
//! message processes it, and whatever reached the output topic is returned.

use courier_core::{BusError, BusSettings, Headers, MessageMetadata, Processor};
use courier_runtime::Worker;
use courier_testing::{InMemoryMessageBus, ProducedMessage};
use serde_json::json;
use std::sync::Arc;

/// Printed when the run produced nothing.
pub const NO_OUTPUT: &str = "No output messages produced.";

/// Request fed to [`run_once`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockRequest {
    /// Sent as `request_text`
    pub request_text: String,
    /// `request_id` header
    pub request_id: Option<String>,
    /// `bot_id` header, seen by the processor as `user_id`
    pub bot_id: Option<String>,
    /// `chat_id` header, seen by the processor as `session_id`
    pub chat_id: Option<String>,
    /// `natal_chart` header, JSON or plain text
    pub natal_chart: Option<String>,
}

impl MockRequest {
    /// Identifier headers; empty values are left out.
    #[must_use]
    pub fn headers(&self) -> Headers {
        [
            ("request_id", &self.request_id),
            ("bot_id", &self.bot_id),
            ("chat_id", &self.chat_id),
            ("natal_chart", &self.natal_chart),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.into()))
        })
        .collect()
    }
}

/// Run `request` through a fresh in-memory bus and return the output topic.
///
/// # Errors
///
/// Returns the worker's error; the in-memory bus itself never fails to start.
pub async fn run_once(
    settings: &BusSettings,
    processor: Arc<dyn Processor>,
    request: &MockRequest,
) -> Result<Vec<ProducedMessage>, BusError> {
    let bus = Arc::new(InMemoryMessageBus::new());
    bus.enqueue_input(
        json!({ "request_text": request.request_text }),
        MessageMetadata::with_headers(request.headers()),
    );

    let worker = Worker::new(bus.clone(), processor, settings.clone()).with_max_messages(1);
    worker.run().await?;

    Ok(bus.topic_messages(&settings.output_topic))
}

/// Pretty JSON of `outputs`, or [`NO_OUTPUT`].
///
/// # Errors
///
/// Returns a serialization error if the messages cannot be rendered.
pub fn render_outputs(outputs: &[ProducedMessage]) -> Result<String, serde_json::Error> {
    if outputs.is_empty() {
        return Ok(NO_OUTPUT.to_string());
    }
    serde_json::to_string_pretty(outputs)
}
