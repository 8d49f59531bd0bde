//! Consume/process/produce worker.
//!
//! A [`Worker`] drives a [`MessageBus`] with itself as the
//! [`MessageHandler`]. For every inbound message it parses the payload,
//! builds the processor context, calls the [`Processor`] and produces
//! `{"response_text": ...}` on the output topic. Returning `Ok(true)` only
//! after the produce call was accepted is what makes the loop at-least-once:
//! any failure before that leaves the message unacknowledged.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──run()──► Running ──stop() / max_messages / signal──► Stopped
//! ```
//!
//! `Stopped` is terminal. Once stopped, the handler refuses further messages
//! without calling the processor.

use crate::context::{merge_context, response_headers};
use crate::lifecycle::shutdown_signal;
use crate::metrics::WorkerMetrics;
use courier_core::bus::BusFuture;
use courier_core::{
    BusError, BusSettings, MessageBus, MessageHandler, MessageMetadata, OutboundMessage, Processor,
    ProcessorError, parse_payload,
};
use parking_lot::Mutex;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lifecycle state of a [`Worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Built, not yet running
    #[default]
    Created,
    /// Consume loop active
    Running,
    /// Terminal
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Cloneable handle that stops a worker from another task.
#[derive(Clone)]
pub struct WorkerHandle {
    bus: Arc<dyn MessageBus>,
    stopped: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Request a stop. Idempotent; only the first call reaches the bus.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bus.stop().await;
    }

    /// True once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Long-running worker bridging the input topic to the output topic.
///
/// # Example
///
/// ```no_run
/// use courier_core::{BusSettings, Processor};
/// use courier_runtime::Worker;
/// use courier_testing::{InMemoryMessageBus, RecordingProcessor};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = Arc::new(InMemoryMessageBus::new());
/// let worker = Worker::new(bus, Arc::new(RecordingProcessor::replying("pong")), BusSettings::default())
///     .with_max_messages(1);
///
/// worker.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Worker {
    bus: Arc<dyn MessageBus>,
    processor: Arc<dyn Processor>,
    settings: BusSettings,
    max_messages: Option<u64>,
    handler_timeout: Option<Duration>,
    stopped: Arc<AtomicBool>,
    processed: AtomicU64,
    state: Mutex<WorkerState>,
}

impl Worker {
    /// Create a worker. The handler timeout defaults to the one in `settings`.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, processor: Arc<dyn Processor>, settings: BusSettings) -> Self {
        let handler_timeout = settings.handler_timeout;
        Self {
            bus,
            processor,
            settings,
            max_messages: None,
            handler_timeout,
            stopped: Arc::new(AtomicBool::new(false)),
            processed: AtomicU64::new(0),
            state: Mutex::new(WorkerState::Created),
        }
    }

    /// Stop after `max` messages were processed and answered.
    #[must_use]
    pub const fn with_max_messages(mut self, max: u64) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Bound every processor call; an expired call is a processing failure.
    #[must_use]
    pub const fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Handle for stopping the worker from elsewhere.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            bus: Arc::clone(&self.bus),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Messages processed and answered so far.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Settings the worker was built with.
    #[must_use]
    pub const fn settings(&self) -> &BusSettings {
        &self.settings
    }

    /// Run until stopped by a signal, [`stop`](Self::stop), `max_messages`
    /// or the bus itself.
    ///
    /// The bus is stopped on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::TransportUnavailable`] if the bus cannot start.
    pub async fn run(&self) -> Result<(), BusError> {
        if self.stopped.load(Ordering::SeqCst) {
            *self.state.lock() = WorkerState::Stopped;
            return Ok(());
        }
        *self.state.lock() = WorkerState::Running;

        let handle = self.handle();
        let signals = tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Stopping worker");
            handle.stop().await;
        });

        tracing::info!(
            input_topic = %self.settings.input_topic,
            output_topic = %self.settings.output_topic,
            max_messages = ?self.max_messages,
            "Worker starting"
        );

        let result = match self.bus.start().await {
            // A signal may have landed while the bus was starting
            Ok(()) if self.stopped.load(Ordering::SeqCst) => {
                tracing::info!("Stop requested during startup, not consuming");
                Ok(())
            },
            Ok(()) => self.bus.consume(self).await,
            Err(e) => {
                tracing::error!(error = %e, "Message bus failed to start");
                Err(e)
            },
        };

        self.bus.stop().await;
        signals.abort();
        *self.state.lock() = WorkerState::Stopped;

        tracing::info!(processed = self.processed(), "Worker stopped");
        result
    }

    /// Request a stop. Idempotent.
    pub async fn stop(&self) {
        self.handle().stop().await;
    }

    /// Process one inbound message.
    ///
    /// Returns `Ok(false)` without calling the processor once the worker is
    /// stopped.
    ///
    /// # Errors
    ///
    /// - [`BusError::HandlerFailure`] if the processor failed or timed out
    /// - any produce error of the bus
    pub async fn handle_message(&self, payload: &str, metadata: &MessageMetadata) -> Result<bool, BusError> {
        if self.stopped.load(Ordering::SeqCst) {
            tracing::debug!(offset = metadata.offset, "Worker stopped, message not handled");
            return Ok(false);
        }

        let parsed = parse_payload(payload);
        let context = merge_context(&parsed, metadata, payload);
        let request_id = context.request_id();

        let started = Instant::now();
        let outcome = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, self.processor.process(parsed.text(), &context))
                .await
                .unwrap_or_else(|_| {
                    WorkerMetrics::record_timeout();
                    Err(ProcessorError::TimedOut(limit))
                }),
            None => self.processor.process(parsed.text(), &context).await,
        };
        WorkerMetrics::record_process(started.elapsed());

        let response = outcome.map_err(|e| {
            WorkerMetrics::record_failure();
            tracing::warn!(request_id = ?request_id, error = %e, "Processor failed");
            BusError::HandlerFailure(e.to_string())
        })?;

        let output = OutboundMessage::new(json!({ "response_text": response.unwrap_or_default() }))
            .with_headers(response_headers(&context));
        self.bus.produce(&self.settings.output_topic, output)?;

        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        WorkerMetrics::record_processed();
        tracing::debug!(
            request_id = ?request_id,
            topic = %self.settings.output_topic,
            processed,
            "Response produced"
        );

        if self.max_messages.is_some_and(|max| processed >= max) {
            tracing::info!(max_messages = processed, "Processed max_messages, stopping");
            self.stop().await;
        }

        Ok(true)
    }
}

impl MessageHandler for Worker {
    fn handle<'a>(
        &'a self,
        payload: &'a str,
        metadata: &'a MessageMetadata,
    ) -> BusFuture<'a, Result<bool, BusError>> {
        Box::pin(self.handle_message(payload, metadata))
    }
}
