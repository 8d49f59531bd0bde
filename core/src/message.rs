//! Message model shared by every transport.
//!
//! Inbound messages arrive as a text payload plus [`MessageMetadata`]
//! (position, key and [`Headers`]). Outbound messages carry a [`Payload`],
//! which may still be structured, and the headers to attach on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single transport header value.
///
/// Header bytes that are valid UTF-8 are decoded to [`HeaderValue::Text`];
/// anything else is kept verbatim as [`HeaderValue::Bytes`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    /// UTF-8 header value
    Text(String),
    /// Undecodable header value
    Bytes(Vec<u8>),
}

impl HeaderValue {
    /// Decode raw header bytes, keeping them as bytes if they are not UTF-8.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Bytes(bytes.to_vec()),
        }
    }

    /// Text view of the value (lossy for undecodable bytes).
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Raw bytes as they go on the wire.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// JSON representation: strings for text, byte arrays otherwise.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Bytes(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Header name to value mapping, ordered by name.
pub type Headers = BTreeMap<String, HeaderValue>;

/// Where an inbound message came from.
///
/// `partition` and `offset` identify the message's position for
/// acknowledgement on the real transport; the in-memory transport leaves
/// them at zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Source topic
    pub topic: String,
    /// Source partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key, if any
    pub key: Option<String>,
    /// Transport headers
    pub headers: Headers,
}

impl MessageMetadata {
    /// Metadata carrying only headers, as used by the in-memory transport.
    #[must_use]
    pub fn with_headers(headers: Headers) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }

    /// Look up a header by any of the given names, first non-empty match wins.
    #[must_use]
    pub fn header(&self, names: &[&str]) -> Option<&HeaderValue> {
        names
            .iter()
            .filter_map(|name| self.headers.get(*name))
            .find(|value| !value.as_bytes().is_empty())
    }
}

/// A decoded unit of work handed to a [`MessageHandler`](crate::bus::MessageHandler).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Payload decoded as text
    pub payload: String,
    /// Position, key and headers
    pub metadata: MessageMetadata,
}

impl InboundMessage {
    /// Create an inbound message.
    #[must_use]
    pub fn new(payload: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self {
            payload: payload.into(),
            metadata,
        }
    }
}

/// Body of an outbound message, either ready text or a structured value.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Already-serialized text
    Text(String),
    /// Structured value, serialized as JSON on produce
    Json(Value),
}

impl Payload {
    /// Serialize to the text that goes on the wire.
    ///
    /// Non-ASCII characters are written verbatim, not escaped.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// A message to produce. Fire-and-forget from the caller's point of view.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundMessage {
    /// Message body
    pub payload: Payload,
    /// Headers attached on the wire
    pub headers: Headers,
}

impl OutboundMessage {
    /// Create an outbound message without headers.
    #[must_use]
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    /// Attach headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}
