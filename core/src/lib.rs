//! # Courier Core
//!
//! Core traits and types for the Courier message bridge.
//!
//! Courier sits between a Kafka-compatible broker and a response-producing
//! business handler. This crate holds everything that does not depend on a
//! concrete transport:
//!
//! - **Settings**: [`settings::BusSettings`], resolved once from the environment
//! - **Messages**: inbound metadata, headers, outbound payloads
//! - **Bus**: the [`bus::MessageBus`] capability and the [`bus::MessageHandler`] callback
//! - **Processor**: the business-layer [`processor::Processor`] and its [`processor::MessageContext`]
//! - **Payload parsing**: [`payload::parse_payload`], a decode step that never fails
//!
//! ## Data Flow
//!
//! ```text
//! broker ──► MessageBus::consume ──► MessageHandler (worker)
//!                                        │
//!                                        ▼
//!                                   Processor::process
//!                                        │
//!                                        ▼
//! broker ◄── MessageBus::produce ◄── output message
//! ```
//!
//! Transport implementations live in separate crates:
//! `courier-redpanda` (rdkafka, manual commit) and `courier-testing`
//! (in-memory queues).

pub mod bus;
pub mod message;
pub mod payload;
pub mod processor;
pub mod settings;

pub use bus::{BusError, BusState, MessageBus, MessageHandler};
pub use message::{HeaderValue, Headers, InboundMessage, MessageMetadata, OutboundMessage, Payload};
pub use payload::{ParsedPayload, parse_payload};
pub use processor::{MessageContext, Processor, ProcessorError};
pub use settings::{BusMode, BusSettings, SettingsError};
