//! Message endpoint: the HTTP twin of the bus worker.
//!
//! The request body goes through the same payload parsing and context merge
//! as a bus message, with request headers standing in for transport headers.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use courier_core::{HeaderValue, Headers, MessageMetadata, ProcessorError, parse_payload};
use courier_runtime::{merge_context, response_headers};
use serde::{Deserialize, Serialize};

/// Topic recorded in the context of HTTP requests.
pub const HTTP_TOPIC: &str = "http";

/// Response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Processor output, or a description of the failure
    pub response_text: String,
}

/// Process a text or JSON body.
///
/// Always answers `200`; a processor failure is reported in
/// `response_text` so the endpoint stays live. Known identifiers are echoed
/// as response headers.
///
/// # Endpoint
///
/// ```text
/// POST /
/// ```
pub async fn process_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let metadata = MessageMetadata {
        topic: HTTP_TOPIC.to_string(),
        headers: transport_headers(&headers),
        ..MessageMetadata::default()
    };
    let parsed = parse_payload(&body);
    let context = merge_context(&parsed, &metadata, &body);
    let request_id = context.request_id();

    let processing = state.processor().process(parsed.text(), &context);
    let outcome = match state.handler_timeout() {
        Some(limit) => tokio::time::timeout(limit, processing)
            .await
            .unwrap_or_else(|_| Err(ProcessorError::TimedOut(limit))),
        None => processing.await,
    };

    let response_text = match outcome {
        Ok(text) => text.unwrap_or_default(),
        Err(e) => {
            tracing::error!(request_id = ?request_id, error = %e, "HTTP message processing failed");
            format!("Error processing message: {e}")
        },
    };

    let mut response = (StatusCode::OK, Json(MessageResponse { response_text })).into_response();
    for (name, value) in response_headers(&context) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            axum::http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

/// Request headers as message headers. Names are lowercase.
fn transport_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), HeaderValue::from_bytes(value.as_bytes())))
        .collect()
}
