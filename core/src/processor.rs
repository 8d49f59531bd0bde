//! Business-layer processor contract.
//!
//! A [`Processor`] turns message text plus a [`MessageContext`] into an
//! optional response text. It is supplied by the business layer and shared by
//! every entry point (the bus worker and the HTTP adapter).
//!
//! Processors should not fail for recoverable conditions; returning an
//! error-describing string keeps the message flowing. Any
//! [`ProcessorError`] is treated as a processing failure by the caller.

use crate::bus::BusFuture;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Context key carrying the request correlation id.
pub const REQUEST_ID: &str = "request_id";
/// Context key carrying the bot id (aliased into [`USER_ID`]).
pub const BOT_ID: &str = "bot_id";
/// Context key carrying the chat id (aliased into [`SESSION_ID`]).
pub const CHAT_ID: &str = "chat_id";
/// Context key carrying the decoded natal chart, if any.
pub const NATAL_CHART: &str = "natal_chart";
/// Canonical user identifier seen by processors.
pub const USER_ID: &str = "user_id";
/// Canonical session identifier seen by processors.
pub const SESSION_ID: &str = "session_id";

/// Errors a processor may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// The processor could not produce a response
    #[error("Processing failed: {0}")]
    Failed(String),

    /// The processor did not finish within the configured bound
    #[error("Processing timed out after {0:?}")]
    TimedOut(Duration),
}

/// Merged per-message context handed to a [`Processor`].
///
/// Backed by a JSON object so processors can reach any transport or payload
/// field, with typed accessors for the canonical identifiers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MessageContext {
    fields: Map<String, Value>,
}

impl MessageContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Copy every field of `other` into this context, replacing existing keys.
    pub fn extend(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field as a non-null string (numbers and booleans are rendered).
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Request correlation id.
    #[must_use]
    pub fn request_id(&self) -> Option<String> {
        self.get_str(REQUEST_ID)
    }

    /// Canonical user id.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.get_str(USER_ID)
    }

    /// Canonical session id.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.get_str(SESSION_ID)
    }

    /// The underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for MessageContext {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Response-producing business handler.
///
/// # Example
///
/// ```
/// use courier_core::bus::BusFuture;
/// use courier_core::processor::{MessageContext, Processor, ProcessorError};
///
/// struct Shout;
///
/// impl Processor for Shout {
///     fn process<'a>(
///         &'a self,
///         text: &'a str,
///         _context: &'a MessageContext,
///     ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
///         Box::pin(async move { Ok(Some(text.to_uppercase())) })
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    /// Produce a response for `text`; `None` means "no response text".
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if no response can be produced.
    fn process<'a>(
        &'a self,
        text: &'a str,
        context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>>;
}
