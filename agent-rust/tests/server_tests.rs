use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use codecanvas_agent::{create_router, Workflow};
use codecanvas_sdk::{
    sdk_test::{MockGenerateResult, MockLanguageModel, MockStreamResult},
    LanguageModelError, ModelResponse, Part, PartialModelResponse,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn label(text: &str) -> ModelResponse {
    ModelResponse {
        content: vec![Part::text(text)],
        usage: None,
    }
}

fn overloaded() -> LanguageModelError {
    LanguageModelError::StatusCode(
        StatusCode::SERVICE_UNAVAILABLE,
        "503 Service Unavailable: model overloaded".to_string(),
    )
}

fn router_with(model: &Arc<MockLanguageModel>) -> Router {
    create_router(Workflow::builder("test", model.clone()).build())
}

fn generate_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (
        status,
        String::from_utf8(bytes.to_vec()).expect("body should be utf-8"),
    )
}

#[tokio::test]
async fn home_reports_liveness() {
    let model = Arc::new(MockLanguageModel::new());
    let request = Request::builder()
        .uri("/")
        .body(Body::empty())
        .expect("request should build");

    let (status, body) = send(router_with(&model), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("CodeCanvas"));
}

#[tokio::test]
async fn chat_reply_is_prefixed_with_chat_marker() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("chat"));
    model.enqueue_stream(MockStreamResult::text_deltas(["Hello", "! How can I help?"]));

    let (status, body) = send(
        router_with(&model),
        generate_request(&json!({ "prompt": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "CHAT:Hello! How can I help?");
    assert!(!body.contains("CODE:"));
}

#[tokio::test]
async fn response_is_plain_text() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("chat"));
    model.enqueue_stream(MockStreamResult::text_deltas(["Hi"]));

    let response = router_with(&model)
        .oneshot(generate_request(&json!({ "prompt": "hello" })))
        .await
        .expect("router is infallible");

    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/plain; charset=utf-8")
    );
}

#[tokio::test]
async fn generated_code_is_prefixed_with_code_marker() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("code_generation"));
    model.enqueue_stream(MockStreamResult::text_deltas([
        "<form>",
        "<input type=\"email\" />",
        "<input type=\"password\" />",
        "</form>",
    ]));

    let (status, body) = send(
        router_with(&model),
        generate_request(&json!({
            "prompt": "create a login form with two inputs",
            "base64Image": null,
            "framework": "html",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "CODE:<form><input type=\"email\" /><input type=\"password\" /></form>"
    );
}

#[tokio::test]
async fn overloaded_model_recovers_on_last_retry() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("code_generation"));
    model.enqueue_stream_results((0..3).map(|_| MockStreamResult::error(overloaded())));
    model.enqueue_stream(MockStreamResult::text_deltas(["<button>", "Click", "</button>"]));

    let (status, body) = send(
        router_with(&model),
        generate_request(&json!({ "prompt": "build a button" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "CODE:<button>Click</button>");
    assert_eq!(model.tracked_stream_inputs().len(), 4);
}

#[tokio::test]
async fn unrecoverable_error_is_streamed_as_code() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("code_generation"));
    model.enqueue_stream(LanguageModelError::StatusCode(
        StatusCode::BAD_REQUEST,
        "invalid image".to_string(),
    ));

    let (status, body) = send(
        router_with(&model),
        generate_request(&json!({ "prompt": "a card", "base64Image": "not-an-image" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "CODE:An error occurred: Status error: invalid image (Status 400 Bad Request)"
    );
    assert_eq!(model.tracked_stream_inputs().len(), 1);
}

#[tokio::test]
async fn mid_stream_failure_ends_body_with_error() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("code_generation"));
    model.enqueue_stream(MockStreamResult::partials_then_error(
        vec![PartialModelResponse::text(0, "<div>")],
        LanguageModelError::Invariant("google", "connection reset".to_string()),
    ));

    let (status, body) = send(
        router_with(&model),
        generate_request(&json!({ "prompt": "a card" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "CODE:<div>An error occurred: Invariant from google: connection reset"
    );
}

#[tokio::test]
async fn classifier_failure_is_internal_error() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::error(overloaded()));

    let (status, body) = send(
        router_with(&model),
        generate_request(&json!({ "prompt": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("overloaded"));
    assert!(model.tracked_stream_inputs().is_empty());
}

#[tokio::test]
async fn missing_prompt_defaults_to_empty() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(label("chat"));
    model.enqueue_stream(MockStreamResult::text_deltas(["What would you like?"]));

    let (status, body) = send(router_with(&model), generate_request(&json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "CHAT:What would you like?");
    assert_eq!(
        model.tracked_stream_inputs()[0].messages,
        vec![codecanvas_sdk::Message::user([Part::text(
            "You are a helpful AI assistant. Respond to the user's message: "
        )])]
    );
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let model = Arc::new(MockLanguageModel::new());
    let request = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .expect("request should build");

    let (status, _) = send(router_with(&model), request).await;

    assert!(status.is_client_error());
    assert!(model.tracked_generate_inputs().is_empty());
}
