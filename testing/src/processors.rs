//! Processor doubles for worker and adapter tests.
//!
//! - [`RecordingProcessor`]: fixed reply, records every call
//! - [`ScriptedProcessor`]: replays a script of results, then echoes
//! - [`FailingProcessor`]: always fails
//! - [`SlowProcessor`]: replies after a delay
//! - [`FnProcessor`]: wraps a closure

use courier_core::bus::BusFuture;
use courier_core::{MessageContext, Processor, ProcessorError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One recorded invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessorCall {
    /// Text passed to the processor
    pub text: String,
    /// Context passed to the processor
    pub context: MessageContext,
}

/// Shared, cloneable call log.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<ProcessorCall>>>,
}

impl CallLog {
    fn record(&self, text: &str, context: &MessageContext) {
        self.calls.lock().push(ProcessorCall {
            text: text.to_string(),
            context: context.clone(),
        });
    }

    /// All calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.calls.lock().clone()
    }

    /// Number of calls so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// True if the processor was never called.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// The most recent call.
    #[must_use]
    pub fn last(&self) -> Option<ProcessorCall> {
        self.calls.lock().last().cloned()
    }
}

/// Replies with a fixed response and records every call.
#[derive(Clone, Debug)]
pub struct RecordingProcessor {
    reply: Option<String>,
    log: CallLog,
}

impl RecordingProcessor {
    /// Reply with `reply` to every message.
    #[must_use]
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            log: CallLog::default(),
        }
    }

    /// Reply with no response text.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            reply: None,
            log: CallLog::default(),
        }
    }

    /// Recorded calls.
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Processor for RecordingProcessor {
    fn process<'a>(
        &'a self,
        text: &'a str,
        context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
        Box::pin(async move {
            self.log.record(text, context);
            Ok(self.reply.clone())
        })
    }
}

/// Replays scripted results in order; once exhausted, echoes the text.
///
/// ```
/// use courier_core::ProcessorError;
/// use courier_testing::ScriptedProcessor;
///
/// // Fails once, then succeeds by echoing
/// let processor = ScriptedProcessor::new([Err(ProcessorError::Failed("boom".into()))]);
/// ```
#[derive(Debug)]
pub struct ScriptedProcessor {
    script: Mutex<VecDeque<Result<Option<String>, ProcessorError>>>,
    log: CallLog,
}

impl ScriptedProcessor {
    /// Create a processor that returns `results` one per call.
    #[must_use]
    pub fn new(results: impl IntoIterator<Item = Result<Option<String>, ProcessorError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            log: CallLog::default(),
        }
    }

    /// Recorded calls.
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Processor for ScriptedProcessor {
    fn process<'a>(
        &'a self,
        text: &'a str,
        context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
        Box::pin(async move {
            self.log.record(text, context);
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| Ok(Some(text.to_string())))
        })
    }
}

/// Always fails with [`ProcessorError::Failed`].
#[derive(Clone, Debug)]
pub struct FailingProcessor {
    reason: String,
}

impl FailingProcessor {
    /// Fail every call with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Processor for FailingProcessor {
    fn process<'a>(
        &'a self,
        _text: &'a str,
        _context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
        Box::pin(async move { Err(ProcessorError::Failed(self.reason.clone())) })
    }
}

/// Echoes the text after sleeping for `delay`.
#[derive(Clone, Copy, Debug)]
pub struct SlowProcessor {
    delay: Duration,
}

impl SlowProcessor {
    /// Sleep for `delay` before every reply.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Processor for SlowProcessor {
    fn process<'a>(
        &'a self,
        text: &'a str,
        _context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(Some(text.to_string()))
        })
    }
}

/// Type alias for synchronous processor closures
type ProcessFn = dyn Fn(&str, &MessageContext) -> Result<Option<String>, ProcessorError> + Send + Sync;

/// Processor backed by a synchronous closure.
pub struct FnProcessor {
    f: Box<ProcessFn>,
}

impl FnProcessor {
    /// Wrap `f`.
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &MessageContext) -> Result<Option<String>, ProcessorError> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl Processor for FnProcessor {
    fn process<'a>(
        &'a self,
        text: &'a str,
        context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
        let result = (self.f)(text, context);
        Box::pin(async move { result })
    }
}
