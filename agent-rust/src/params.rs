use crate::{graph::MAX_RETRIES, instruction::DEFAULT_SYSTEM_INSTRUCTION, Workflow};
use codecanvas_sdk::LanguageModel;
use std::sync::Arc;

/// Parameters required to create a new workflow.
/// # Default Values
/// - `classifier_model`, `chat_model`, `code_model`: the model given to `new`
/// - `system_instruction`: [`DEFAULT_SYSTEM_INSTRUCTION`]
/// - `max_retries`: 3, which is also the upper bound
/// - `classifier_temperature`: 0.0
/// - `chat_temperature`: 0.7
/// - `code_temperature`: 0.2
pub struct WorkflowParams {
    pub name: String,
    /// Model labelling prompts as chat or code generation.
    pub classifier_model: Arc<dyn LanguageModel + Send + Sync>,
    /// Model answering conversational prompts.
    pub chat_model: Arc<dyn LanguageModel + Send + Sync>,
    /// Model generating UI code.
    pub code_model: Arc<dyn LanguageModel + Send + Sync>,
    /// Directive governing the style of generated code.
    pub system_instruction: String,
    /// Retries allowed after the model reports it is overloaded.
    pub max_retries: u32,
    pub classifier_temperature: f64,
    pub chat_temperature: f64,
    /// Kept low to favor deterministic structured output.
    pub code_temperature: f64,
}

impl WorkflowParams {
    pub fn new(name: &str, model: Arc<dyn LanguageModel + Send + Sync>) -> Self {
        Self {
            name: name.to_string(),
            classifier_model: model.clone(),
            chat_model: model.clone(),
            code_model: model,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            max_retries: MAX_RETRIES,
            classifier_temperature: 0.0,
            chat_temperature: 0.7,
            code_temperature: 0.2,
        }
    }

    /// Set the model used for intent classification
    #[must_use]
    pub fn classifier_model(mut self, model: Arc<dyn LanguageModel + Send + Sync>) -> Self {
        self.classifier_model = model;
        self
    }

    /// Set the model used for chat replies
    #[must_use]
    pub fn chat_model(mut self, model: Arc<dyn LanguageModel + Send + Sync>) -> Self {
        self.chat_model = model;
        self
    }

    /// Set the model used for code generation
    #[must_use]
    pub fn code_model(mut self, model: Arc<dyn LanguageModel + Send + Sync>) -> Self {
        self.code_model = model;
        self
    }

    /// Set the system instruction for code generation
    #[must_use]
    pub fn system_instruction(mut self, system_instruction: impl Into<String>) -> Self {
        self.system_instruction = system_instruction.into();
        self
    }

    /// Set the number of retries after an overloaded model, at most
    /// [`MAX_RETRIES`]
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.min(MAX_RETRIES);
        self
    }

    #[must_use]
    pub fn classifier_temperature(mut self, temperature: f64) -> Self {
        self.classifier_temperature = temperature;
        self
    }

    #[must_use]
    pub fn chat_temperature(mut self, temperature: f64) -> Self {
        self.chat_temperature = temperature;
        self
    }

    #[must_use]
    pub fn code_temperature(mut self, temperature: f64) -> Self {
        self.code_temperature = temperature;
        self
    }

    #[must_use]
    pub fn build(self) -> Workflow {
        Workflow::new(self)
    }
}
