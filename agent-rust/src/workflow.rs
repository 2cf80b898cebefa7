use crate::{
    graph::{self, GenerationOutcome, Node, Transition},
    nodes,
    opentelemetry::trace_workflow_stream,
    Intent, WorkflowError, WorkflowEvent, WorkflowOutput, WorkflowParams, WorkflowState,
    WorkflowStream,
};
use codecanvas_sdk::LanguageModel;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

/// The intent routing and code generation state machine.
///
/// A `Workflow` holds only shared, read-only configuration. Each run gets its
/// own [`WorkflowState`], so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct Workflow {
    pub name: String,
    pub(crate) classifier_model: Arc<dyn LanguageModel + Send + Sync>,
    pub(crate) chat_model: Arc<dyn LanguageModel + Send + Sync>,
    pub(crate) code_model: Arc<dyn LanguageModel + Send + Sync>,
    system_instruction: String,
    pub(crate) max_retries: u32,
    pub(crate) classifier_temperature: f64,
    pub(crate) chat_temperature: f64,
    pub(crate) code_temperature: f64,
}

struct Step {
    transition: Transition,
    event: Option<WorkflowEvent>,
}

impl Step {
    fn new(transition: Transition) -> Self {
        Self {
            transition,
            event: None,
        }
    }

    fn with_event(mut self, event: WorkflowEvent) -> Self {
        self.event = Some(event);
        self
    }
}

impl Workflow {
    #[must_use]
    pub fn new(params: WorkflowParams) -> Self {
        Self {
            name: params.name,
            classifier_model: params.classifier_model,
            chat_model: params.chat_model,
            code_model: params.code_model,
            system_instruction: params.system_instruction,
            max_retries: params.max_retries,
            classifier_temperature: params.classifier_temperature,
            chat_temperature: params.chat_temperature,
            code_temperature: params.code_temperature,
        }
    }

    pub fn builder(name: &str, model: Arc<dyn LanguageModel + Send + Sync>) -> WorkflowParams {
        WorkflowParams::new(name, model)
    }

    /// Create the state for a fresh run, with this workflow's system
    /// instruction and no retries spent.
    pub fn initial_state(
        &self,
        prompt: impl Into<String>,
        base64_image: Option<String>,
        framework: Option<String>,
    ) -> WorkflowState {
        WorkflowState::new(prompt, self.system_instruction.clone())
            .with_image(base64_image)
            .with_framework(framework)
    }

    /// Run the workflow and yield an event as each node completes. The last
    /// event of a successful run is [`WorkflowEvent::Output`].
    pub fn run_stream(&self, state: WorkflowState) -> WorkflowStream {
        let workflow = self.clone();
        let max_steps = graph::step_limit(self.max_retries);

        let stream = async_stream::try_stream! {
            let mut state = state;
            let mut node = Node::ENTRY;
            let mut steps = 0;

            loop {
                steps += 1;
                if steps > max_steps {
                    Err(WorkflowError::MaxStepsExceeded(max_steps))?;
                }

                debug!(%node, "entering node");
                let Step { transition, event } = workflow.step(node, &mut state).await?;

                if let Some(event) = event {
                    yield event;
                }

                match transition {
                    Transition::Next(next) => node = next,
                    Transition::End => {
                        yield WorkflowEvent::Output(take_output(&mut state)?);
                        break;
                    }
                }
            }
        };

        trace_workflow_stream(&self.name, stream)
    }

    /// Run the workflow to its terminal output, ignoring intermediate events.
    pub async fn run(&self, state: WorkflowState) -> Result<WorkflowOutput, WorkflowError> {
        let mut events = self.run_stream(state);
        while let Some(event) = events.next().await {
            if let WorkflowEvent::Output(output) = event? {
                return Ok(output);
            }
        }
        Err(WorkflowError::Invariant(
            "workflow ended without output".to_string(),
        ))
    }

    async fn step(&self, node: Node, state: &mut WorkflowState) -> Result<Step, WorkflowError> {
        let step = match node {
            Node::ClassifyIntent => {
                let intent = self.classify_intent(state).await?;
                Step::new(graph::route_intent(intent))
                    .with_event(WorkflowEvent::IntentClassified(intent))
            }
            Node::Chat => {
                self.chat(state).await?;
                Step::new(Transition::End)
            }
            Node::PrepareCodePrompt => {
                state.model_parts =
                    nodes::build_model_parts(&state.prompt, state.base64_image.as_deref());
                Step::new(Transition::Next(Node::GenerateCode)).with_event(
                    WorkflowEvent::CodePromptPrepared {
                        part_count: state.model_parts.len(),
                    },
                )
            }
            Node::GenerateCode => {
                self.generate_code(state).await;
                let outcome = GenerationOutcome::from_error(state.error_message.as_deref());
                let step = Step::new(graph::route_generation(outcome));
                match &state.error_message {
                    Some(error) => step.with_event(WorkflowEvent::GenerationFailed {
                        attempt: state.generation_attempts,
                        error: error.clone(),
                    }),
                    None => step,
                }
            }
            Node::HandleError => match self.handle_error(state) {
                Transition::Next(next) => Step::new(Transition::Next(next)).with_event(
                    WorkflowEvent::RetryScheduled {
                        retry_count: state.retry_count,
                    },
                ),
                Transition::End => Step::new(Transition::End),
            },
        };

        Ok(step)
    }
}

fn take_output(state: &mut WorkflowState) -> Result<WorkflowOutput, WorkflowError> {
    let output = match state.intent {
        Some(Intent::Chat) => state.chat_response.take().map(WorkflowOutput::Chat),
        Some(Intent::CodeGeneration) => state.generated_code.take().map(WorkflowOutput::Code),
        None => None,
    };

    output.ok_or_else(|| WorkflowError::Invariant("workflow ended without output".to_string()))
}
