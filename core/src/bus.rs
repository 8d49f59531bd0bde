//! Message bus abstraction for the consume/process/produce loop.
//!
//! This module provides the [`MessageBus`] trait, the capability every
//! transport implements, and the [`MessageHandler`] callback the bus drives
//! for each inbound message.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Broker      │
//! └────────┬────────┘
//!          │ poll (bounded timeout)
//!          ▼
//! ┌─────────────────┐
//! │   MessageBus    │──── commit offset on Ok(true)
//! │    consume()    │
//! └────────┬────────┘
//!          │ handle(payload, metadata)
//!          ▼
//! ┌─────────────────┐
//! │ MessageHandler  │──── produce(output_topic, ...)
//! │    (worker)     │
//! └─────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once**, driven by the handler's result:
//! - `Ok(true)`: the message is acknowledged (real transport: offset committed
//!   synchronously; in-memory transport: message discarded)
//! - `Ok(false)`: not acknowledged, the message will be seen again
//! - `Err(_)`: logged with the payload, treated exactly like `Ok(false)`
//!
//! A single message's failure never terminates the consume loop.
//!
//! # Implementations
//!
//! - `KafkaMessageBus` in `courier-redpanda` - rdkafka with manual commit
//! - `InMemoryMessageBus` in `courier-testing` - in-process queues
//!
//! # Dyn Compatibility
//!
//! Async operations return `Pin<Box<dyn Future>>` instead of using `async fn`
//! so the worker can hold an `Arc<dyn MessageBus>` chosen at startup.

use crate::message::{MessageMetadata, OutboundMessage};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during message bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Client could not be created or connected; fatal at start
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The local send buffer is saturated; the caller decides to retry or drop
    #[error("Producer queue is full for topic '{topic}'")]
    QueueFull {
        /// Topic the message was meant for
        topic: String,
    },

    /// Producer rejected the message synchronously for another reason
    #[error("Produce failed for topic '{topic}': {reason}")]
    ProduceFailed {
        /// Topic the message was meant for
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Inbound bytes could not be decoded; the message is skipped
    #[error("Decode failed at {topic}[{partition}]@{offset}: {reason}")]
    DecodeError {
        /// Source topic
        topic: String,
        /// Source partition
        partition: i32,
        /// Source offset
        offset: i64,
        /// The reason for failure
        reason: String,
    },

    /// Offset commit failed; the message may be reprocessed after restart
    #[error("Commit failed at {topic}[{partition}]@{offset}: {reason}")]
    CommitFailure {
        /// Source topic
        topic: String,
        /// Source partition
        partition: i32,
        /// Source offset
        offset: i64,
        /// The reason for failure
        reason: String,
    },

    /// The handler failed; the message stays unacknowledged
    #[error("Handler failed: {0}")]
    HandlerFailure(String),
}

/// Lifecycle state of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusState {
    /// No clients held, consume loops exit
    #[default]
    Stopped,
    /// Clients established, consume loop may poll
    Running,
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Boxed future returned by bus and handler operations.
pub type BusFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback the bus invokes for every inbound message.
///
/// The returned flag is the processing result: `true` acknowledges the
/// message, `false` leaves it for redelivery. An `Err` is logged by the bus
/// and handled like `false`.
pub trait MessageHandler: Send + Sync {
    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Returns an error if processing failed; the bus will not acknowledge
    /// the message.
    fn handle<'a>(
        &'a self,
        payload: &'a str,
        metadata: &'a MessageMetadata,
    ) -> BusFuture<'a, Result<bool, BusError>>;
}

/// Trait for pluggable message transports.
///
/// Both implementations honour the same contract:
///
/// - [`start`](Self::start) and [`stop`](Self::stop) are idempotent
/// - [`produce`](Self::produce) never blocks; back-pressure surfaces as
///   [`BusError::QueueFull`]
/// - [`consume`](Self::consume) is the main loop and returns once the bus is
///   stopped
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the worker produces through the
/// same bus that is driving its consume loop, and a signal task may request
/// [`stop`](Self::stop) from another task. Transport clients themselves are
/// only ever touched by the loop owner.
pub trait MessageBus: Send + Sync {
    /// Establish connections and subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::TransportUnavailable`] if the clients cannot be
    /// created. This is fatal to the worker; reconnect policy belongs to the
    /// process supervisor.
    fn start(&self) -> BusFuture<'_, Result<(), BusError>>;

    /// Stop the bus and release its clients.
    ///
    /// Pending produced messages are flushed with a bounded timeout; flush
    /// errors are logged, never returned.
    fn stop(&self) -> BusFuture<'_, ()>;

    /// Enqueue a message for asynchronous delivery.
    ///
    /// # Errors
    ///
    /// - [`BusError::QueueFull`] when the local send buffer is saturated
    /// - [`BusError::TransportUnavailable`] when the bus was never started
    /// - [`BusError::ProduceFailed`] for other synchronous rejections
    fn produce(&self, topic: &str, message: OutboundMessage) -> Result<(), BusError>;

    /// Drive `handler` with inbound messages until the bus is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::TransportUnavailable`] if the bus had to be
    /// started and that failed. Per-message failures never surface here.
    fn consume<'a>(&'a self, handler: &'a dyn MessageHandler) -> BusFuture<'a, Result<(), BusError>>;

    /// Current lifecycle state.
    fn state(&self) -> BusState;
}
