//! Redpanda message bus implementation for Courier.
//!
//! This crate provides a Redpanda/Kafka-backed bus that implements the
//! [`MessageBus`] trait from `courier-core`. It uses rdkafka for
//! Kafka-compatible messaging.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  StreamConsumer │◄─── poll with bounded timeout
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ MessageHandler  │
//! └────────┬────────┘
//!          │ Ok(true)
//!          ▼
//! ┌─────────────────┐
//! │  commit (sync)  │◄─── only after success
//! └─────────────────┘
//!
//! ┌─────────────────┐
//! │ThreadedProducer │◄─── fire-and-forget, delivery reports logged
//! └─────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - `enable.auto.commit=false`; the offset is committed synchronously only
//!   after the handler returns `Ok(true)`
//! - `Ok(false)` and `Err(_)` leave the offset uncommitted and rewind the
//!   partition to it, so the message is redelivered before anything after it
//!   and a later commit on the same partition never covers it
//! - Messages that can never be decoded (no value, invalid UTF-8) are
//!   committed and skipped
//! - Ordering is preserved within a partition: one message is handled and
//!   committed before the next poll
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{BusSettings, MessageBus, OutboundMessage};
//! use courier_redpanda::KafkaMessageBus;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = BusSettings::from_env()?;
//! let bus = KafkaMessageBus::new(settings);
//!
//! bus.start().await?;
//! bus.produce("courier-output", OutboundMessage::new("hello"))?;
//! bus.stop().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use courier_core::bus::BusFuture;
use courier_core::{
    BusError, BusSettings, BusState, HeaderValue, Headers, MessageBus, MessageHandler,
    MessageMetadata, OutboundMessage,
};
use parking_lot::Mutex;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{Header, Headers as _, Message, OwnedHeaders, OwnedMessage};
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::util::Timeout;
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Producer context that logs asynchronous delivery reports.
///
/// Delivery failures are not retried and never reach the caller of
/// [`MessageBus::produce`].
pub struct DeliveryReporter;

impl ClientContext for DeliveryReporter {}

impl ProducerContext for DeliveryReporter {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _delivery_opaque: Self::DeliveryOpaque) {
        match delivery_result {
            Ok(message) => {
                metrics::counter!("bus_messages_delivered_total").increment(1);
                tracing::debug!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Kafka message delivered"
                );
            },
            Err((error, message)) => {
                metrics::counter!("bus_delivery_failures_total").increment(1);
                tracing::error!(
                    topic = message.topic(),
                    partition = message.partition(),
                    error = %error,
                    "Kafka delivery failed"
                );
            },
        }
    }
}

/// Client handles owned by a running bus.
struct KafkaClients {
    consumer: Arc<StreamConsumer>,
    producer: ThreadedProducer<DeliveryReporter>,
}

/// Redpanda message bus implementation.
///
/// Wraps a consumer/producer pair created on [`start`](MessageBus::start)
/// and released on [`stop`](MessageBus::stop):
///
/// - **Consumer**: subscribed to the input topic, manual commit
/// - **Producer**: threaded producer with a background poll thread that
///   delivers the delivery reports
///
/// # Shutdown
///
/// `stop()` only flips the running flag while a consume loop is active; the
/// loop notices within one poll timeout, exits, and releases the clients
/// itself (bounded producer flush, consumer leaves the group). Without an
/// active loop, `stop()` releases the clients directly.
///
/// A stop stays requested until the next explicit `start()`;
/// [`consume`](MessageBus::consume) never reopens a stopped bus.
pub struct KafkaMessageBus {
    settings: BusSettings,
    running: AtomicBool,
    stop_requested: AtomicBool,
    consuming: AtomicBool,
    clients: Mutex<Option<KafkaClients>>,
}

impl KafkaMessageBus {
    /// Create a stopped bus for the given settings.
    ///
    /// No connection is attempted until [`start`](MessageBus::start).
    #[must_use]
    pub fn new(settings: BusSettings) -> Self {
        Self {
            settings,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            consuming: AtomicBool::new(false),
            clients: Mutex::new(None),
        }
    }

    /// Settings this bus was created with.
    #[must_use]
    pub const fn settings(&self) -> &BusSettings {
        &self.settings
    }

    /// Create the clients if needed and mark the bus running.
    ///
    /// Leaves a pending stop request untouched.
    fn open(&self) -> Result<(), BusError> {
        {
            let mut clients = self.clients.lock();
            if self.running.load(Ordering::SeqCst) && clients.is_some() {
                return Ok(());
            }
            if clients.is_none() {
                *clients = Some(self.create_clients()?);
            }
            self.running.store(true, Ordering::SeqCst);
        }

        tracing::info!(
            topic = %self.settings.input_topic,
            group = %self.settings.group_id,
            bootstrap = %self.settings.bootstrap_servers,
            manual_commit = true,
            "Kafka consumer subscribed"
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.stop_requested.load(Ordering::SeqCst)
    }

    fn create_clients(&self) -> Result<KafkaClients, BusError> {
        let consumer: StreamConsumer = client_config(&self.settings.consumer_config())
            .create()
            .map_err(|e| BusError::TransportUnavailable(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[self.settings.input_topic.as_str()])
            .map_err(|e| {
                BusError::TransportUnavailable(format!(
                    "Failed to subscribe to '{}': {e}",
                    self.settings.input_topic
                ))
            })?;

        let producer: ThreadedProducer<DeliveryReporter> =
            client_config(&self.settings.producer_config())
                .create_with_context(DeliveryReporter)
                .map_err(|e| {
                    BusError::TransportUnavailable(format!("Failed to create producer: {e}"))
                })?;

        Ok(KafkaClients {
            consumer: Arc::new(consumer),
            producer,
        })
    }

    /// Drop the consumer (leaving the group) and flush the producer.
    async fn release(&self) {
        let clients = self.clients.lock().take();
        let Some(KafkaClients { consumer, producer }) = clients else {
            return;
        };
        drop(consumer);

        let flush_timeout = self.settings.flush_timeout;
        match tokio::task::spawn_blocking(move || producer.flush(Timeout::After(flush_timeout))).await {
            Ok(Ok(())) => tracing::debug!("Kafka producer flushed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Kafka producer flush failed"),
            Err(e) => tracing::warn!(error = %e, "Kafka producer flush task failed"),
        }

        tracing::info!("Kafka message bus stopped");
    }

    /// Run one message through the handler and acknowledge it on success.
    async fn dispatch(
        &self,
        consumer: &StreamConsumer,
        message: &OwnedMessage,
        handler: &dyn MessageHandler,
    ) {
        metrics::counter!("bus_messages_consumed_total").increment(1);
        let metadata = build_metadata(message);

        let payload = match decode_payload(message) {
            Ok(payload) => payload,
            Err(e) => {
                metrics::counter!("bus_messages_skipped_total").increment(1);
                tracing::warn!(error = %e, "Skipping undecodable message");
                // Malformed bytes never parse: commit so the message is not redelivered
                if let Err(e) = commit(consumer, message) {
                    tracing::error!(error = %e, "Kafka commit failed for skipped message");
                }
                return;
            },
        };

        match handler.handle(&payload, &metadata).await {
            Ok(true) => match commit(consumer, message) {
                Ok(()) => {
                    metrics::counter!("bus_messages_committed_total").increment(1);
                    tracing::trace!(
                        topic = %metadata.topic,
                        partition = metadata.partition,
                        offset = metadata.offset,
                        "Offset committed"
                    );
                },
                Err(e) => {
                    metrics::counter!("bus_commit_failures_total").increment(1);
                    tracing::error!(error = %e, "Kafka commit failed (message may be reprocessed)");
                },
            },
            Ok(false) => {
                metrics::counter!("bus_messages_failed_total").increment(1);
                tracing::warn!(
                    topic = %metadata.topic,
                    partition = metadata.partition,
                    offset = metadata.offset,
                    "Handler reported failure, message will be reprocessed"
                );
                self.rewind(consumer, message);
            },
            Err(e) => {
                metrics::counter!("bus_messages_failed_total").increment(1);
                tracing::error!(
                    topic = %metadata.topic,
                    partition = metadata.partition,
                    offset = metadata.offset,
                    error = %e,
                    payload = %payload,
                    "Message handling failed"
                );
                self.rewind(consumer, message);
            },
        }
    }

    /// Seek the partition back to an unacknowledged message so the next poll
    /// redelivers it and no later offset on that partition gets committed
    /// first.
    fn rewind(&self, consumer: &StreamConsumer, message: &OwnedMessage) {
        let position = Offset::Offset(message.offset());
        match consumer.seek(
            message.topic(),
            message.partition(),
            position,
            Timeout::After(self.settings.poll_timeout),
        ) {
            Ok(()) => tracing::debug!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "Partition rewound to unacknowledged message"
            ),
            Err(e) => {
                metrics::counter!("bus_seek_failures_total").increment(1);
                tracing::error!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    error = %e,
                    "Kafka seek failed, message is redelivered only after restart"
                );
            },
        }
    }
}

impl MessageBus for KafkaMessageBus {
    fn start(&self) -> BusFuture<'_, Result<(), BusError>> {
        Box::pin(async move {
            self.stop_requested.store(false, Ordering::SeqCst);
            self.open()
        })
    }

    fn stop(&self) -> BusFuture<'_, ()> {
        Box::pin(async move {
            self.stop_requested.store(true, Ordering::SeqCst);
            if self.running.swap(false, Ordering::SeqCst) {
                tracing::info!("Kafka message bus stopping");
            }
            if self.consuming.load(Ordering::SeqCst) {
                tracing::debug!("Consume loop active, client release deferred to loop exit");
                return;
            }
            self.release().await;
        })
    }

    fn produce(&self, topic: &str, message: OutboundMessage) -> Result<(), BusError> {
        let OutboundMessage { payload, headers } = message;
        let payload = payload.into_text();

        let clients = self.clients.lock();
        let Some(clients) = clients.as_ref() else {
            return Err(BusError::TransportUnavailable(
                "Kafka message bus is not started".to_string(),
            ));
        };

        let mut record = BaseRecord::<(), str>::to(topic).payload(payload.as_str());
        if !headers.is_empty() {
            record = record.headers(build_headers(&headers));
        }

        match clients.producer.send(record) {
            Ok(()) => {
                metrics::counter!("bus_messages_produced_total").increment(1);
                tracing::debug!(topic = %topic, "Message enqueued");
                Ok(())
            },
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                metrics::counter!("bus_queue_full_total").increment(1);
                tracing::error!(topic = %topic, "Kafka producer queue is full");
                Err(BusError::QueueFull {
                    topic: topic.to_string(),
                })
            },
            Err((e, _)) => {
                tracing::error!(topic = %topic, error = %e, "Kafka produce rejected");
                Err(BusError::ProduceFailed {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            },
        }
    }

    fn consume<'a>(&'a self, handler: &'a dyn MessageHandler) -> BusFuture<'a, Result<(), BusError>> {
        Box::pin(async move {
            if self.stop_requested.load(Ordering::SeqCst) {
                tracing::debug!("Stop requested, consume loop not started");
                return Ok(());
            }
            self.open()?;
            let consumer = self
                .clients
                .lock()
                .as_ref()
                .map(|clients| Arc::clone(&clients.consumer));
            let Some(consumer) = consumer else {
                tracing::debug!("Bus stopped before the consume loop began");
                return Ok(());
            };

            self.consuming.store(true, Ordering::SeqCst);
            let poll_timeout = self.settings.poll_timeout;

            while self.is_open() {
                let Some(received) = poll(&consumer, poll_timeout).await else {
                    continue;
                };
                match received {
                    Ok(message) => self.dispatch(&consumer, &message, handler).await,
                    Err(e) => {
                        metrics::counter!("bus_consume_errors_total").increment(1);
                        tracing::error!(error = %e, "Kafka consumer error");
                    },
                }
            }

            drop(consumer);
            self.running.store(false, Ordering::SeqCst);
            self.consuming.store(false, Ordering::SeqCst);
            self.release().await;
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

fn client_config(entries: &[(&'static str, String)]) -> ClientConfig {
    let mut config = ClientConfig::new();
    for (key, value) in entries {
        config.set(*key, value);
    }
    config
}

/// Wait up to `timeout` for the next message, detached from the consumer.
async fn poll(consumer: &StreamConsumer, timeout: Duration) -> Option<KafkaResult<OwnedMessage>> {
    match tokio::time::timeout(timeout, consumer.recv()).await {
        Ok(result) => Some(result.map(|message| message.detach())),
        Err(_) => None,
    }
}

/// Commit the offset following `message` on its partition.
fn commit(consumer: &StreamConsumer, message: &OwnedMessage) -> Result<(), BusError> {
    let failure = |reason: String| BusError::CommitFailure {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        reason,
    };

    let mut positions = TopicPartitionList::new();
    positions
        .add_partition_offset(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset() + 1),
        )
        .map_err(|e| failure(e.to_string()))?;
    consumer
        .commit(&positions, CommitMode::Sync)
        .map_err(|e| failure(e.to_string()))
}

/// Position, key and headers of a received message.
///
/// Header values that are not UTF-8 are preserved as bytes; headers without
/// a value are dropped.
#[must_use]
pub fn build_metadata(message: &OwnedMessage) -> MessageMetadata {
    let mut headers = Headers::new();
    if let Some(owned) = message.headers() {
        for header in owned.iter() {
            if let Some(value) = header.value {
                headers.insert(header.key.to_string(), HeaderValue::from_bytes(value));
            }
        }
    }

    MessageMetadata {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message
            .key()
            .map(|key| String::from_utf8_lossy(key).into_owned()),
        headers,
    }
}

/// Message value as text.
///
/// # Errors
///
/// Returns [`BusError::DecodeError`] if the message has no value or the value
/// is not valid UTF-8.
pub fn decode_payload(message: &OwnedMessage) -> Result<String, BusError> {
    let failure = |reason: &str| BusError::DecodeError {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        reason: reason.to_string(),
    };

    let value = message.payload().ok_or_else(|| failure("message has no value"))?;
    std::str::from_utf8(value)
        .map(str::to_string)
        .map_err(|e| failure(&format!("value is not valid UTF-8: {e}")))
}

/// Wire headers for an outbound message.
#[must_use]
pub fn build_headers(headers: &Headers) -> OwnedHeaders {
    headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(headers.len()), |wire, (key, value)| {
            wire.insert(Header {
                key: key.as_str(),
                value: Some(value.as_bytes()),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::Timestamp;
    use rdkafka::message::Headers as _;

    fn settings() -> BusSettings {
        BusSettings {
            bootstrap_servers: "127.0.0.1:1".to_string(),
            poll_timeout: Duration::from_millis(50),
            flush_timeout: Duration::from_millis(200),
            ..BusSettings::default()
        }
    }

    fn owned_message(payload: Option<&[u8]>, headers: Option<OwnedHeaders>) -> OwnedMessage {
        OwnedMessage::new(
            payload.map(<[u8]>::to_vec),
            Some(b"key-1".to_vec()),
            "courier-input".to_string(),
            Timestamp::NotAvailable,
            3,
            42,
            headers,
        )
    }

    #[test]
    fn kafka_message_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaMessageBus>();
        assert_sync::<KafkaMessageBus>();
    }

    #[test]
    fn new_bus_is_stopped() {
        let bus = KafkaMessageBus::new(settings());
        assert_eq!(bus.state(), BusState::Stopped);
        assert_eq!(bus.settings().input_topic, "courier-input");
    }

    #[test]
    fn produce_before_start_is_unavailable() {
        let bus = KafkaMessageBus::new(settings());
        let result = bus.produce("courier-output", OutboundMessage::new("hello"));
        assert!(matches!(result, Err(BusError::TransportUnavailable(_))));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let bus = KafkaMessageBus::new(settings());
        bus.stop().await;
        bus.stop().await;
        assert_eq!(bus.state(), BusState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_and_stop_are_idempotent() {
        let bus = KafkaMessageBus::new(settings());

        // Client creation does not connect, so no broker is needed here
        bus.start().await.ok();
        bus.start().await.ok();
        assert_eq!(bus.state(), BusState::Running);

        bus.stop().await;
        bus.stop().await;
        assert_eq!(bus.state(), BusState::Stopped);
        assert!(bus.clients.lock().is_none());
    }

    /// Handler that must never be reached.
    struct Unreachable;

    impl MessageHandler for Unreachable {
        fn handle<'a>(
            &'a self,
            _payload: &'a str,
            _metadata: &'a MessageMetadata,
        ) -> BusFuture<'a, Result<bool, BusError>> {
            Box::pin(async { Err(BusError::HandlerFailure("unexpected message".to_string())) })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consume_after_stop_does_not_reopen_the_bus() {
        let bus = KafkaMessageBus::new(settings());
        bus.start().await.ok();
        bus.stop().await;

        let result = bus.consume(&Unreachable).await;

        assert!(result.is_ok());
        assert_eq!(bus.state(), BusState::Stopped);
        assert!(bus.clients.lock().is_none());
    }

    #[test]
    fn metadata_preserves_position_key_and_headers() {
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "request_id",
                value: Some("r1"),
            })
            .insert(Header {
                key: "binary",
                value: Some(&[0xff_u8, 0x00][..]),
            })
            .insert(Header::<&str> {
                key: "empty",
                value: None,
            });
        let message = owned_message(Some(b"hello"), Some(headers));

        let metadata = build_metadata(&message);
        assert_eq!(metadata.topic, "courier-input");
        assert_eq!(metadata.partition, 3);
        assert_eq!(metadata.offset, 42);
        assert_eq!(metadata.key.as_deref(), Some("key-1"));
        assert_eq!(
            metadata.headers.get("request_id"),
            Some(&HeaderValue::Text("r1".to_string()))
        );
        assert_eq!(
            metadata.headers.get("binary"),
            Some(&HeaderValue::Bytes(vec![0xff, 0x00]))
        );
        assert!(!metadata.headers.contains_key("empty"));
    }

    #[test]
    fn missing_value_is_a_decode_error() {
        let message = owned_message(None, None);
        assert!(matches!(
            decode_payload(&message),
            Err(BusError::DecodeError { offset: 42, .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let message = owned_message(Some(&[0xc3, 0x28]), None);
        assert!(matches!(decode_payload(&message), Err(BusError::DecodeError { .. })));
    }

    #[test]
    fn utf8_value_decodes() {
        let message = owned_message(Some("привет".as_bytes()), None);
        assert_eq!(decode_payload(&message).ok().as_deref(), Some("привет"));
    }

    #[test]
    fn outbound_headers_round_trip_to_wire() {
        let mut headers = Headers::new();
        headers.insert("bot_id".to_string(), "b1".into());
        headers.insert("raw".to_string(), HeaderValue::Bytes(vec![1, 2, 3]));

        let wire = build_headers(&headers);
        assert_eq!(wire.count(), 2);
        let decoded: Vec<(String, Vec<u8>)> = wire
            .iter()
            .map(|h| (h.key.to_string(), h.value.map(<[u8]>::to_vec).unwrap_or_default()))
            .collect();
        assert!(decoded.contains(&("bot_id".to_string(), b"b1".to_vec())));
        assert!(decoded.contains(&("raw".to_string(), vec![1, 2, 3])));
    }
}
