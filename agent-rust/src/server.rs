use crate::{nodes::format_error_message, Workflow, WorkflowEvent, WorkflowOutput};
use async_stream::stream;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{debug, error, info};

pub const CHAT_MARKER: &str = "CHAT:";
pub const CODE_MARKER: &str = "CODE:";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, rename = "base64Image")]
    pub base64_image: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
}

#[derive(Clone)]
struct AppState {
    workflow: Workflow,
}

pub fn create_router(workflow: Workflow) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/api/generate", post(generate_handler))
        .with_state(AppState { workflow })
}

async fn home_handler() -> &'static str {
    "CodeCanvas AI backend is running. POST /api/generate to generate UI code."
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Response, (StatusCode, String)> {
    let GenerateRequest {
        prompt,
        base64_image,
        framework,
    } = body;

    info!(
        has_image = base64_image.as_deref().is_some_and(|image| !image.is_empty()),
        framework = framework.as_deref().unwrap_or_default(),
        "received generate request"
    );

    let initial_state =
        state
            .workflow
            .initial_state(prompt.unwrap_or_default(), base64_image, framework);
    let mut events = state.workflow.run_stream(initial_state);

    let output = loop {
        match events.next().await {
            Some(Ok(WorkflowEvent::Output(output))) => break output,
            Some(Ok(event)) => log_event(&event),
            Some(Err(err)) => {
                error!(error = %err, "workflow failed");
                return Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()));
            }
            None => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "workflow ended without output".to_string(),
                ))
            }
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(output_body(output)),
    )
        .into_response())
}

fn log_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::IntentClassified(intent) => debug!(%intent, "intent classified"),
        WorkflowEvent::CodePromptPrepared { part_count } => {
            debug!(part_count, "code prompt prepared");
        }
        WorkflowEvent::GenerationFailed { attempt, error } => {
            debug!(attempt, error = %error, "generation attempt failed");
        }
        WorkflowEvent::RetryScheduled { retry_count } => debug!(retry_count, "retry scheduled"),
        WorkflowEvent::Output(_) => {}
    }
}

/// The response body: a `CHAT:` or `CODE:` marker followed by the tokens.
/// A failure after the body has started ends it with an error sentence.
pub fn output_body(output: WorkflowOutput) -> impl Stream<Item = Result<String, Infallible>> {
    let (marker, mut tokens) = match output {
        WorkflowOutput::Chat(tokens) => (CHAT_MARKER, tokens),
        WorkflowOutput::Code(code) => (CODE_MARKER, code.into_tokens()),
    };

    stream! {
        yield Ok(marker.to_string());

        while let Some(token) = tokens.next().await {
            match token {
                Ok(token) => yield Ok(token),
                Err(err) => {
                    error!(error = %err, "token stream failed");
                    yield Ok(format_error_message(&err.to_string()));
                    break;
                }
            }
        }
    }
}
