//! Inbound payload decoding.
//!
//! Payloads are either a JSON object of the shape
//! `{"request_text"|"message"|"payload": string, "metadata"?: object}` or
//! opaque text. [`parse_payload`] resolves this into a tagged
//! [`ParsedPayload`] and never fails: a permanently malformed message must
//! not be retried forever, so undecodable input simply becomes plain text.

use serde_json::{Map, Value};

/// Object fields checked, in order, for the message text.
pub const TEXT_FIELDS: [&str; 3] = ["request_text", "message", "payload"];

/// Object field holding embedded metadata.
pub const METADATA_FIELD: &str = "metadata";

/// Result of decoding a raw payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedPayload {
    /// A JSON object: extracted text plus embedded metadata (possibly empty)
    Structured {
        /// Message text
        text: String,
        /// Embedded `metadata` object
        metadata: Map<String, Value>,
    },
    /// Anything else, taken as the message text
    PlainText(String),
}

impl ParsedPayload {
    /// Message text regardless of variant.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Structured { text, .. } | Self::PlainText(text) => text,
        }
    }

    /// Embedded metadata; empty for plain text.
    #[must_use]
    pub fn metadata(&self) -> Map<String, Value> {
        match self {
            Self::Structured { metadata, .. } => metadata.clone(),
            Self::PlainText(_) => Map::new(),
        }
    }

    /// Split into text and embedded metadata.
    #[must_use]
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        match self {
            Self::Structured { text, metadata } => (text, metadata),
            Self::PlainText(text) => (text, Map::new()),
        }
    }
}

/// Decode a raw payload.
///
/// - object: first non-empty text field wins; without one the whole object
///   (re-serialized) is the text; `metadata` is kept only if it is an object
/// - JSON string: its content
/// - other JSON values: re-serialized
/// - not JSON: the raw input
#[must_use]
pub fn parse_payload(raw: &str) -> ParsedPayload {
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return ParsedPayload::PlainText(raw.to_string());
    };

    match parsed {
        Value::Object(object) => {
            let metadata = match object.get(METADATA_FIELD) {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            let text = TEXT_FIELDS
                .iter()
                .find_map(|field| object.get(*field).and_then(field_text))
                .unwrap_or_else(|| Value::Object(object.clone()).to_string());
            ParsedPayload::Structured { text, metadata }
        }
        Value::String(text) => ParsedPayload::PlainText(text),
        other => ParsedPayload::PlainText(other.to_string()),
    }
}

/// Text of a candidate field; empty, null and `false` values do not count.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn request_text_with_metadata() {
        let parsed = parse_payload(r#"{"request_text": "hi", "metadata": {"user_id": "u1"}}"#);
        assert_eq!(parsed.text(), "hi");
        assert_eq!(parsed.metadata().get("user_id"), Some(&json!("u1")));
    }

    #[test]
    fn text_fields_are_checked_in_order() {
        let parsed = parse_payload(r#"{"payload": "third", "message": "second"}"#);
        assert_eq!(parsed.text(), "second");

        let parsed = parse_payload(r#"{"request_text": "", "payload": "third"}"#);
        assert_eq!(parsed.text(), "third");
    }

    #[test]
    fn object_without_text_field_is_reserialized() {
        let parsed = parse_payload(r#"{"foo": 1}"#);
        assert_eq!(parsed.text(), r#"{"foo":1}"#);
        assert!(parsed.metadata().is_empty());
    }

    #[test]
    fn non_object_metadata_is_ignored() {
        let parsed = parse_payload(r#"{"message": "hey", "metadata": [1, 2]}"#);
        assert_eq!(parsed.text(), "hey");
        assert!(parsed.metadata().is_empty());
    }

    #[test]
    fn json_string_is_unwrapped() {
        assert_eq!(
            parse_payload(r#""quoted text""#),
            ParsedPayload::PlainText("quoted text".to_string())
        );
    }

    #[test]
    fn other_json_values_are_reserialized() {
        assert_eq!(parse_payload("[1, 2]"), ParsedPayload::PlainText("[1,2]".to_string()));
        assert_eq!(parse_payload("42"), ParsedPayload::PlainText("42".to_string()));
    }

    #[test]
    fn malformed_payload_is_plain_text() {
        let parsed = parse_payload("not json {");
        assert_eq!(parsed, ParsedPayload::PlainText("not json {".to_string()));
        assert!(parsed.metadata().is_empty());
    }

    proptest! {
        #[test]
        fn parse_never_panics_and_plain_text_is_verbatim(raw in ".*") {
            let parsed = parse_payload(&raw);
            if serde_json::from_str::<Value>(&raw).is_err() {
                prop_assert_eq!(parsed.text(), raw.as_str());
                prop_assert!(parsed.metadata().is_empty());
            }
        }
    }
}
