//! Per-message context assembly.
//!
//! [`merge_context`] combines transport metadata, metadata embedded in the
//! payload and well-known identifier headers into the [`MessageContext`] a
//! processor sees. [`response_headers`] picks the identifiers echoed back on
//! the response.
//!
//! Precedence, lowest to highest:
//!
//! ```text
//! transport metadata  (topic, partition, offset, key, headers)
//!   < embedded payload metadata
//!     < identifier headers (request_id, bot_id, chat_id, natal_chart)
//! ```
//!
//! Identifier keys come from headers only: an identifier embedded in the
//! payload is replaced by `null` when the header is missing, so only
//! transport identifiers are echoed on the response. Embedded values stay
//! available under `input_payload` and feed the `user_id`/`session_id`
//! fallbacks.

use courier_core::processor::{BOT_ID, CHAT_ID, NATAL_CHART, REQUEST_ID, SESSION_ID, USER_ID};
use courier_core::{HeaderValue, Headers, MessageContext, MessageMetadata, ParsedPayload};
use serde_json::{Map, Value};

/// Context key holding the transport headers.
pub const INPUT_HEADERS: &str = "input_headers";
/// Context key holding the embedded payload metadata.
pub const INPUT_PAYLOAD: &str = "input_payload";
/// Context key holding the undecoded payload.
pub const RAW_PAYLOAD: &str = "raw_payload";

/// Identifier keys with their accepted header spellings.
const IDENTIFIER_HEADERS: [(&str, [&str; 2]); 3] = [
    (REQUEST_ID, ["request_id", "request-id"]),
    (BOT_ID, ["bot_id", "bot-id"]),
    (CHAT_ID, ["chat_id", "chat-id"]),
];

const NATAL_CHART_HEADERS: [&str; 2] = ["natal_chart", "natal-chart"];

/// Identifiers echoed on every response, when known.
const RESPONSE_HEADERS: [&str; 3] = [REQUEST_ID, BOT_ID, CHAT_ID];

/// Build the processor context for one message.
///
/// Identifier keys always hold the header value, `null` without one.
/// `user_id` falls back from `bot_id` to an embedded `user_id`, and
/// `session_id` from `chat_id` to an embedded `session_id`.
#[must_use]
pub fn merge_context(
    parsed: &ParsedPayload,
    metadata: &MessageMetadata,
    raw_payload: &str,
) -> MessageContext {
    let headers = headers_json(&metadata.headers);
    let embedded = parsed.metadata();

    let mut context = MessageContext::new();
    context.insert("topic", metadata.topic.clone());
    context.insert("partition", metadata.partition);
    context.insert("offset", metadata.offset);
    context.insert("key", metadata.key.clone());
    context.insert("headers", Value::Object(headers.clone()));
    context.extend(&embedded);

    for (key, names) in IDENTIFIER_HEADERS {
        let value = metadata.header(&names).map_or(Value::Null, HeaderValue::to_json);
        context.insert(key, value);
    }

    let natal_chart = metadata
        .header(&NATAL_CHART_HEADERS)
        .map_or(Value::Null, decode_natal_chart);
    context.insert(NATAL_CHART, natal_chart);

    let user_id = first_truthy(&context, &[BOT_ID, USER_ID]);
    context.insert(USER_ID, user_id);
    let session_id = first_truthy(&context, &[CHAT_ID, SESSION_ID]);
    context.insert(SESSION_ID, session_id);

    context.insert(INPUT_HEADERS, Value::Object(headers));
    context.insert(INPUT_PAYLOAD, Value::Object(embedded));
    context.insert(RAW_PAYLOAD, raw_payload);
    context
}

/// Headers for the response: `request_id`, `bot_id` and `chat_id` when not null.
#[must_use]
pub fn response_headers(context: &MessageContext) -> Headers {
    RESPONSE_HEADERS
        .iter()
        .filter_map(|key| {
            context
                .get_str(key)
                .map(|value| ((*key).to_string(), HeaderValue::Text(value)))
        })
        .collect()
}

fn headers_json(headers: &Headers) -> Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

/// JSON-decoded chart when possible, the raw text otherwise.
fn decode_natal_chart(value: &HeaderValue) -> Value {
    match value {
        HeaderValue::Text(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        },
        HeaderValue::Bytes(_) => value.to_json(),
    }
}

fn first_truthy(context: &MessageContext, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|key| context.get(key))
        .find(|value| is_truthy(value))
        .cloned()
        .unwrap_or(Value::Null)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Bool(true) => true,
    }
}
