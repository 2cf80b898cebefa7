use crate::{
    AssistantMessage, ContentDelta, ImagePart, Message, ModelResponse, ModelUsage, Part,
    PartDelta, PartialModelResponse, TextPart, TextPartDelta, UserMessage,
};

impl TextPart {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for TextPart {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TextPart {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl ImagePart {
    pub fn new(image_data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            image_data: image_data.into(),
        }
    }

    /// Render the image as a `data:<mime>;base64,<data>` URI.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.image_data)
    }
}

impl From<TextPart> for Part {
    fn from(value: TextPart) -> Self {
        Self::Text(value)
    }
}

impl From<ImagePart> for Part {
    fn from(value: ImagePart) -> Self {
        Self::Image(value)
    }
}

impl From<&str> for Part {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart::new(text))
    }

    pub fn image(image_data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image(ImagePart::new(image_data, mime_type))
    }
}

impl UserMessage {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self {
            content: parts.into_iter().map(Into::into).collect(),
        }
    }
}

impl AssistantMessage {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self {
            content: parts.into_iter().map(Into::into).collect(),
        }
    }
}

impl Message {
    pub fn user<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self::User(UserMessage::new(parts))
    }

    pub fn assistant<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self::Assistant(AssistantMessage::new(parts))
    }
}

impl From<UserMessage> for Message {
    fn from(value: UserMessage) -> Self {
        Self::User(value)
    }
}

impl From<AssistantMessage> for Message {
    fn from(value: AssistantMessage) -> Self {
        Self::Assistant(value)
    }
}

impl ModelUsage {
    pub fn add(&mut self, other: &Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl ModelResponse {
    /// Concatenate all text parts of the response.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                Part::Text(text_part) => text_part.text.as_str(),
                Part::Image(_) => "",
            })
            .collect()
    }
}

impl PartialModelResponse {
    /// Construct a partial response carrying a single text delta.
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self {
            delta: Some(ContentDelta {
                index,
                part: PartDelta::Text(TextPartDelta { text: text.into() }),
            }),
            usage: None,
        }
    }

    /// The text carried by this partial, if any.
    #[must_use]
    pub fn text_delta(&self) -> Option<&str> {
        match &self.delta {
            Some(ContentDelta {
                part: PartDelta::Text(delta),
                ..
            }) => Some(delta.text.as_str()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_response_text_skips_images() {
        let response = ModelResponse {
            content: vec![
                Part::text("code"),
                Part::image("aGk=", "image/png"),
                Part::text("_generation"),
            ],
            usage: None,
        };

        assert_eq!(response.text(), "code_generation");
    }

    #[test]
    fn image_part_renders_data_uri() {
        let image = ImagePart::new("aGk=", "image/webp");
        assert_eq!(image.data_uri(), "data:image/webp;base64,aGk=");
    }

    #[test]
    fn partial_text_delta_reads_text() {
        assert_eq!(PartialModelResponse::text(0, "<div>").text_delta(), Some("<div>"));
        assert_eq!(PartialModelResponse::default().text_delta(), None);
    }
}
