//! HTTP adapter behaviour through the full router.

#![allow(clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use courier_core::ProcessorError;
use courier_testing::{FailingProcessor, FnProcessor, RecordingProcessor, SlowProcessor};
use courier_web::{AppState, MessageResponse, router};
use std::sync::Arc;
use std::time::Duration;

fn server(state: AppState) -> TestServer {
    TestServer::new(router(state)).expect("Failed to build test server")
}

#[tokio::test]
async fn root_and_health_report_ok() {
    let server = server(AppState::new(Arc::new(RecordingProcessor::silent())));

    for path in ["/", "/health"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        assert_eq!(response.text(), "ok");
    }
}

#[tokio::test]
async fn plain_text_body_is_processed() {
    let processor = Arc::new(RecordingProcessor::replying("pong"));
    let server = server(AppState::new(processor.clone()));

    let response = server.post("/").text("ping").await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<MessageResponse>(),
        MessageResponse {
            response_text: "pong".to_string()
        }
    );
    assert_eq!(processor.log().last().map(|c| c.text).as_deref(), Some("ping"));
}

#[tokio::test]
async fn json_body_and_headers_feed_the_context() {
    let processor = Arc::new(FnProcessor::new(|text, context| {
        Ok(Some(format!(
            "{text}|{}|{}",
            context.user_id().unwrap_or_default(),
            context.session_id().unwrap_or_default()
        )))
    }));
    let server = server(AppState::new(processor));

    let response = server
        .post("/")
        .json(&serde_json::json!({"request_text": "hello", "metadata": {"session_id": "s-embedded"}}))
        .add_header(HeaderName::from_static("bot-id"), HeaderValue::from_static("b1"))
        .add_header(HeaderName::from_static("request_id"), HeaderValue::from_static("r1"))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<MessageResponse>().response_text, "hello|b1|s-embedded");
    assert_eq!(
        response.headers().get("request_id").and_then(|v| v.to_str().ok()),
        Some("r1")
    );
    assert_eq!(
        response.headers().get("bot_id").and_then(|v| v.to_str().ok()),
        Some("b1")
    );
    assert!(response.headers().get("chat_id").is_none());
}

#[tokio::test]
async fn processor_failure_still_answers_ok() {
    let server = server(AppState::new(Arc::new(FailingProcessor::new("model offline"))));

    let response = server.post("/").text("hello").await;

    response.assert_status_ok();
    let body = response.json::<MessageResponse>();
    assert!(body.response_text.contains("model offline"));
}

#[tokio::test]
async fn processor_timeout_still_answers_ok() {
    let state = AppState::new(Arc::new(SlowProcessor::new(Duration::from_secs(5))))
        .with_handler_timeout(Some(Duration::from_millis(20)));
    let server = server(state);

    let response = server.post("/").text("hello").await;

    response.assert_status_ok();
    let expected = ProcessorError::TimedOut(Duration::from_millis(20)).to_string();
    assert!(response.json::<MessageResponse>().response_text.contains(&expected));
}

#[tokio::test]
async fn empty_result_is_an_empty_response_text() {
    let server = server(AppState::new(Arc::new(RecordingProcessor::silent())));

    let response = server.post("/").text("hello").await;

    assert_eq!(response.json::<MessageResponse>().response_text, "");
}

#[tokio::test]
async fn metrics_are_disabled_without_an_exporter() {
    let server = server(AppState::new(Arc::new(RecordingProcessor::silent())));

    let response = server.get("/metrics").await;

    response.assert_status(StatusCode::NOT_FOUND);
}
