use crate::{GeneratedCode, Intent, TokenStream};
use codecanvas_sdk::Part;

/// The record threaded through every node of one workflow run. It is created
/// per request and dropped once the response has been streamed.
#[derive(Debug, Default)]
pub struct WorkflowState {
    /// Raw user input.
    pub prompt: String,
    /// Image attachment, either raw base64 or a `data:` URI.
    pub base64_image: Option<String>,
    /// Target UI framework hint. Carried along, not interpreted.
    pub framework: Option<String>,
    /// Directive governing code-generation style.
    pub system_instruction: String,
    /// Multi-modal model input, populated on the code generation branch.
    pub model_parts: Vec<Part>,
    pub generated_code: Option<GeneratedCode>,
    /// Error of the last generation attempt. Cleared when a new attempt starts.
    pub error_message: Option<String>,
    /// Retries scheduled after transient failures.
    pub retry_count: u32,
    /// Generation attempts made, the first one included.
    pub generation_attempts: u32,
    pub intent: Option<Intent>,
    pub chat_response: Option<TokenStream>,
}

impl WorkflowState {
    pub fn new(prompt: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: system_instruction.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, base64_image: Option<String>) -> Self {
        self.base64_image = base64_image;
        self
    }

    #[must_use]
    pub fn with_framework(mut self, framework: Option<String>) -> Self {
        self.framework = framework;
        self
    }
}
