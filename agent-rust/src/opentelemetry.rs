use crate::{Intent, WorkflowError, WorkflowEvent, WorkflowStream};
use async_stream::try_stream;
use futures::{pin_mut, Stream, StreamExt};
use opentelemetry::trace::Status;
use std::error::Error;
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

struct WorkflowSpan {
    span: Span,
    intent: Option<Intent>,
    generation_attempts: u32,
    retry_count: u32,
}

impl WorkflowSpan {
    fn new(workflow_name: &str) -> Self {
        let span = info_span!("codecanvas_agent.run_stream");
        span.set_attribute("gen_ai.operation.name", "invoke_agent");
        span.set_attribute("gen_ai.agent.name", workflow_name.to_string());

        Self {
            span,
            intent: None,
            generation_attempts: 0,
            retry_count: 0,
        }
    }

    fn span(&self) -> Span {
        self.span.clone()
    }

    fn on_event(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::IntentClassified(intent) => self.intent = Some(*intent),
            WorkflowEvent::GenerationFailed { attempt, .. } => {
                self.generation_attempts = *attempt;
            }
            WorkflowEvent::RetryScheduled { retry_count } => {
                self.retry_count = *retry_count;
                self.generation_attempts = retry_count + 1;
            }
            WorkflowEvent::CodePromptPrepared { .. } => {
                self.generation_attempts = self.generation_attempts.max(1);
            }
            WorkflowEvent::Output(_) => {}
        }
    }

    fn on_error(&mut self, error: &(dyn Error + 'static)) {
        self.span
            .set_attribute("exception.message", error.to_string());
        self.span.set_status(Status::error(error.to_string()));
    }
}

impl Drop for WorkflowSpan {
    fn drop(&mut self) {
        if let Some(intent) = self.intent {
            self.span
                .set_attribute("codecanvas_agent.intent", intent.as_str());
        }
        if self.generation_attempts > 0 {
            self.span.set_attribute(
                "codecanvas_agent.generation_attempts",
                i64::from(self.generation_attempts),
            );
        }
        self.span
            .set_attribute("codecanvas_agent.retry_count", i64::from(self.retry_count));
    }
}

/// Wrap a workflow run in a span that stays open until the event stream is
/// exhausted or dropped.
pub fn trace_workflow_stream<S>(workflow_name: &str, stream: S) -> WorkflowStream
where
    S: Stream<Item = Result<WorkflowEvent, WorkflowError>> + Send + 'static,
{
    let workflow_span = WorkflowSpan::new(workflow_name);
    let span_handle = workflow_span.span();

    let instrumented = try_stream! {
        let mut span = workflow_span;
        let events = stream;
        pin_mut!(events);

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    span.on_event(&event);
                    yield event;
                }
                Err(err) => {
                    span.on_error(&err);
                    Err(err)?;
                }
            }
        }
    }
    .instrument(span_handle);

    WorkflowStream::from_stream(instrumented)
}
