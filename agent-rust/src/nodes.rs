use crate::{
    graph::{GenerationOutcome, Node, Transition},
    instruction::{chat_prompt, classification_prompt},
    GeneratedCode, Intent, TokenStream, Workflow, WorkflowError, WorkflowState,
};
use codecanvas_sdk::{
    ImagePart, LanguageModel, LanguageModelInput, LanguageModelResult, Message, Part,
};
use futures::StreamExt;
use tracing::{error, info, warn};

/// Mime type assumed for raw base64 attachments.
pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/png";

impl Workflow {
    pub(crate) async fn classify_intent(
        &self,
        state: &mut WorkflowState,
    ) -> Result<Intent, WorkflowError> {
        info!(node = %Node::ClassifyIntent, "classifying intent");

        let response = self
            .classifier_model
            .generate(LanguageModelInput {
                messages: vec![Message::user([Part::text(classification_prompt(
                    &state.prompt,
                ))])],
                temperature: Some(self.classifier_temperature),
                ..Default::default()
            })
            .await?;

        let label = response.text();
        let intent = Intent::from_label(&label).unwrap_or_else(|| {
            warn!(label = %label.trim(), "unrecognized intent label, defaulting to code generation");
            Intent::CodeGeneration
        });

        info!(%intent, "intent classified");
        state.intent = Some(intent);
        Ok(intent)
    }

    pub(crate) async fn chat(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        info!(node = %Node::Chat, "streaming chat reply");

        let stream = self
            .chat_model
            .stream(LanguageModelInput {
                messages: vec![Message::user([Part::text(chat_prompt(&state.prompt))])],
                temperature: Some(self.chat_temperature),
                ..Default::default()
            })
            .await?;

        state.chat_response = Some(TokenStream::from_model_stream(stream));
        Ok(())
    }

    /// Start one code generation attempt. Failures are recorded in the state
    /// instead of being returned so that the error handler can decide on a
    /// retry.
    pub(crate) async fn generate_code(&self, state: &mut WorkflowState) {
        state.error_message = None;
        state.generation_attempts += 1;
        let attempt = state.generation_attempts;
        info!(node = %Node::GenerateCode, attempt, "generating code");

        let input = LanguageModelInput {
            system_prompt: Some(state.system_instruction.clone()),
            messages: vec![Message::user(state.model_parts.clone())],
            temperature: Some(self.code_temperature),
            ..Default::default()
        };

        match open_token_stream(self.code_model.as_ref(), input).await {
            Ok(tokens) => state.generated_code = Some(GeneratedCode::Stream(tokens)),
            Err(err) => {
                warn!(attempt, error = %err, "code generation failed");
                state.error_message = Some(err.to_string());
            }
        }
    }

    pub(crate) fn handle_error(&self, state: &mut WorkflowState) -> Transition {
        let outcome = GenerationOutcome::from_error(state.error_message.as_deref());

        if outcome == GenerationOutcome::TransientError && state.retry_count < self.max_retries {
            state.retry_count += 1;
            info!(
                retry_count = state.retry_count,
                max_retries = self.max_retries,
                "model overloaded, retrying"
            );
            return Transition::Next(Node::GenerateCode);
        }

        let message = state.error_message.as_deref().unwrap_or_default();
        error!(error = %message, retry_count = state.retry_count, "giving up on code generation");
        state.generated_code = Some(GeneratedCode::Message(format_error_message(message)));
        Transition::End
    }
}

/// Open a model stream and wait for its first token, so that failures
/// reported at the start of the stream count as a failed attempt.
async fn open_token_stream(
    model: &dyn LanguageModel,
    input: LanguageModelInput,
) -> LanguageModelResult<TokenStream> {
    let mut tokens = TokenStream::from_model_stream(model.stream(input).await?);
    match tokens.next().await {
        Some(Ok(first)) => Ok(tokens.prepend(first)),
        Some(Err(err)) => Err(err),
        None => Ok(tokens),
    }
}

/// The text prompt followed by the image attachment, if any.
#[must_use]
pub fn build_model_parts(prompt: &str, base64_image: Option<&str>) -> Vec<Part> {
    let mut parts = vec![Part::text(prompt)];
    if let Some(image) = base64_image.and_then(parse_image_attachment) {
        parts.push(image.into());
    }
    parts
}

/// Accepts either a `data:<mime>;base64,<data>` URI or raw base64 data.
/// Returns `None` for empty input.
#[must_use]
pub fn parse_image_attachment(attachment: &str) -> Option<ImagePart> {
    let attachment = attachment.trim();
    if attachment.is_empty() {
        return None;
    }

    let Some((header, data)) = attachment
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
    else {
        return Some(ImagePart::new(attachment, DEFAULT_IMAGE_MIME_TYPE));
    };

    if data.is_empty() {
        return None;
    }

    let mime_type = header.split(';').next().unwrap_or_default();
    let mime_type = if mime_type.is_empty() {
        DEFAULT_IMAGE_MIME_TYPE
    } else {
        mime_type
    };

    Some(ImagePart::new(data, mime_type))
}

#[must_use]
pub fn format_error_message(error: &str) -> String {
    format!("An error occurred: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_uri_attachment() {
        let image = parse_image_attachment("data:image/jpeg;base64,/9j/4AAQ");
        assert_eq!(image, Some(ImagePart::new("/9j/4AAQ", "image/jpeg")));
    }

    #[test]
    fn raw_base64_defaults_to_png() {
        let image = parse_image_attachment("iVBORw0KGgo=");
        assert_eq!(image, Some(ImagePart::new("iVBORw0KGgo=", "image/png")));
    }

    #[test]
    fn data_uri_without_mime_defaults_to_png() {
        let image = parse_image_attachment("data:;base64,AAAA");
        assert_eq!(image, Some(ImagePart::new("AAAA", "image/png")));
    }

    #[test]
    fn empty_attachment_is_absent() {
        assert_eq!(parse_image_attachment(""), None);
        assert_eq!(parse_image_attachment("   "), None);
        assert_eq!(parse_image_attachment("data:image/png;base64,"), None);
    }

    #[test]
    fn model_parts_put_text_first() {
        let parts = build_model_parts("make a card", Some("data:image/png;base64,AAAA"));
        assert_eq!(
            parts,
            vec![Part::text("make a card"), Part::image("AAAA", "image/png")]
        );

        assert_eq!(
            build_model_parts("make a card", None),
            vec![Part::text("make a card")]
        );
    }

    #[test]
    fn formats_error_message() {
        assert_eq!(
            format_error_message("Status error: bad (Status 400 Bad Request)"),
            "An error occurred: Status error: bad (Status 400 Bad Request)"
        );
    }
}
