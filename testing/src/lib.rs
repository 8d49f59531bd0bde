//! # Courier Testing
//!
//! Testing utilities for Courier workers and transports.
//!
//! This crate provides:
//! - [`InMemoryMessageBus`]: an in-process [`MessageBus`](courier_core::MessageBus)
//!   with requeue-on-failure acknowledgement, used by tests and by the
//!   `mock` bus mode
//! - Processor doubles: recording, scripted, failing, slow and closure-backed
//!
//! ## Example
//!
//! ```ignore
//! use courier_testing::{InMemoryMessageBus, RecordingProcessor};
//!
//! #[tokio::test]
//! async fn replies_are_produced() {
//!     let bus = Arc::new(InMemoryMessageBus::new());
//!     bus.enqueue_input("hello", MessageMetadata::default());
//!
//!     let worker = Worker::new(bus.clone(), Arc::new(RecordingProcessor::replying("hi")), settings);
//!     worker.run().await?;
//!
//!     assert_eq!(bus.topic_messages("courier-output").len(), 1);
//! }
//! ```

pub mod message_bus;
pub mod processors;

// Re-export commonly used items
pub use message_bus::{InMemoryMessageBus, ProducedMessage};
pub use processors::{
    CallLog, FailingProcessor, FnProcessor, ProcessorCall, RecordingProcessor, ScriptedProcessor,
    SlowProcessor,
};
