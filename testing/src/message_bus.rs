//! In-memory message bus for fast, deterministic tests and local runs.
//!
//! [`InMemoryMessageBus`] simulates topics with in-process queues:
//! - inputs are fed with [`InMemoryMessageBus::enqueue_input`]
//! - produced messages are recorded per topic and read back with
//!   [`InMemoryMessageBus::topic_messages`]
//!
//! Acknowledgement mirrors the real transport's manual commit: a message the
//! handler acknowledges is discarded, anything else goes back to the tail of
//! the input queue.
//!
//! An explicit [`stop`](MessageBus::stop) is latched until the next explicit
//! [`start`](MessageBus::start): [`consume`](MessageBus::consume) never
//! reopens a bus that was asked to stop.

use courier_core::bus::BusFuture;
use courier_core::{
    BusError, BusState, Headers, InboundMessage, MessageBus, MessageHandler, MessageMetadata,
    OutboundMessage, Payload,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

/// A message recorded by [`InMemoryMessageBus::produce`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProducedMessage {
    /// Serialized payload
    pub value: String,
    /// Headers attached by the producer
    pub headers: Headers,
}

impl ProducedMessage {
    /// Payload parsed as JSON, if it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.value).ok()
    }

    /// Header as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).map(courier_core::HeaderValue::to_text)
    }
}

/// In-memory [`MessageBus`] implementation.
///
/// # Example
///
/// ```
/// use courier_core::{MessageBus, MessageMetadata, OutboundMessage};
/// use courier_testing::InMemoryMessageBus;
///
/// let bus = InMemoryMessageBus::new();
/// bus.enqueue_input("hello", MessageMetadata::default());
/// assert_eq!(bus.pending_inputs(), 1);
///
/// bus.produce("out", OutboundMessage::new("world")).unwrap();
/// assert_eq!(bus.topic_messages("out")[0].value, "world");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMessageBus {
    running: AtomicBool,
    stop_requested: AtomicBool,
    max_messages: Option<usize>,
    inputs: Mutex<VecDeque<InboundMessage>>,
    topics: Mutex<HashMap<String, Vec<ProducedMessage>>>,
}

impl InMemoryMessageBus {
    /// Create a stopped bus with empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return from [`consume`](MessageBus::consume) after `max` successfully
    /// handled messages.
    #[must_use]
    pub const fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Append a message to the input queue.
    ///
    /// Structured payloads are serialized the same way produce does.
    pub fn enqueue_input(&self, payload: impl Into<Payload>, metadata: MessageMetadata) {
        let payload = payload.into().into_text();
        self.inputs
            .lock()
            .push_back(InboundMessage::new(payload, metadata));
    }

    /// Messages produced to `topic`, oldest first.
    #[must_use]
    pub fn topic_messages(&self, topic: &str) -> Vec<ProducedMessage> {
        self.topics.lock().get(topic).cloned().unwrap_or_default()
    }

    /// Number of messages still waiting in the input queue.
    #[must_use]
    pub fn pending_inputs(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Mark the bus running without clearing a pending stop request.
    fn open(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("In-memory message bus started");
        }
    }

    fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.stop_requested.load(Ordering::SeqCst)
    }
}

impl MessageBus for InMemoryMessageBus {
    fn start(&self) -> BusFuture<'_, Result<(), BusError>> {
        Box::pin(async move {
            self.stop_requested.store(false, Ordering::SeqCst);
            self.open();
            Ok(())
        })
    }

    fn stop(&self) -> BusFuture<'_, ()> {
        Box::pin(async move {
            self.stop_requested.store(true, Ordering::SeqCst);
            if self.running.swap(false, Ordering::SeqCst) {
                tracing::debug!("In-memory message bus stopped");
            }
        })
    }

    fn produce(&self, topic: &str, message: OutboundMessage) -> Result<(), BusError> {
        let OutboundMessage { payload, headers } = message;
        let value = payload.into_text();
        tracing::debug!(topic = %topic, payload = %value, "In-memory produce");

        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(ProducedMessage { value, headers });
        Ok(())
    }

    fn consume<'a>(&'a self, handler: &'a dyn MessageHandler) -> BusFuture<'a, Result<(), BusError>> {
        Box::pin(async move {
            if self.stop_requested.load(Ordering::SeqCst) {
                tracing::debug!("Stop requested, consume loop not started");
                return Ok(());
            }
            self.open();

            let mut handled = 0_usize;
            while self.is_open() {
                let next = self.inputs.lock().pop_front();
                let Some(message) = next else {
                    break;
                };

                let acknowledged = match handler.handle(&message.payload, &message.metadata).await {
                    Ok(acknowledged) => acknowledged,
                    Err(e) => {
                        tracing::error!(error = %e, payload = %message.payload, "In-memory handler failed");
                        false
                    },
                };

                if acknowledged {
                    handled += 1;
                } else {
                    tracing::debug!("Message requeued for retry");
                    self.inputs.lock().push_back(message);
                }

                if self.max_messages.is_some_and(|max| handled >= max) {
                    break;
                }
                tokio::task::yield_now().await;
            }

            if self.stop_requested.load(Ordering::SeqCst) {
                self.running.store(false, Ordering::SeqCst);
            } else if self.pending_inputs() == 0 {
                tracing::debug!("In-memory queue drained");
            }
            Ok(())
        })
    }

    fn state(&self) -> BusState {
        if self.running.load(Ordering::SeqCst) {
            BusState::Running
        } else {
            BusState::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn produce_records_per_topic() {
        let bus = InMemoryMessageBus::new();
        let mut headers = Headers::new();
        headers.insert("request_id".to_string(), "r1".into());

        bus.produce("a", OutboundMessage::new(json!({"response_text": "hi"})).with_headers(headers))
            .ok();
        bus.produce("b", OutboundMessage::new("plain")).ok();

        let a = bus.topic_messages("a");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].json(), Some(json!({"response_text": "hi"})));
        assert_eq!(a[0].header("request_id").as_deref(), Some("r1"));
        assert_eq!(bus.topic_messages("b")[0].value, "plain");
        assert!(bus.topic_messages("c").is_empty());
    }

    #[test]
    fn structured_inputs_are_serialized() {
        let bus = InMemoryMessageBus::new();
        bus.enqueue_input(json!({"request_text": "привет"}), MessageMetadata::default());
        let queued = bus.inputs.lock().front().cloned();
        assert_eq!(
            queued.map(|m| m.payload).as_deref(),
            Some(r#"{"request_text":"привет"}"#)
        );
    }

    #[tokio::test]
    async fn lifecycle_is_idempotent() {
        let bus = InMemoryMessageBus::new();
        assert_eq!(bus.state(), BusState::Stopped);

        bus.start().await.ok();
        bus.start().await.ok();
        assert_eq!(bus.state(), BusState::Running);

        bus.stop().await;
        bus.stop().await;
        assert_eq!(bus.state(), BusState::Stopped);
    }

    #[tokio::test]
    async fn explicit_start_clears_a_stop_request() {
        let bus = InMemoryMessageBus::new();
        bus.stop().await;
        assert!(bus.stop_requested.load(Ordering::SeqCst));

        bus.start().await.ok();
        assert!(!bus.stop_requested.load(Ordering::SeqCst));
        assert!(bus.is_open());
    }
}
