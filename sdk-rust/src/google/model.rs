use super::api::{
    ApiError, Blob, Content, GenerateContentConfig, GenerateContentParameters,
    GenerateContentResponse, GenerateContentResponseUsageMetadata, Part as GooglePart,
};
use crate::{
    client_utils, ContentDelta, ImagePart, LanguageModel, LanguageModelError, LanguageModelInput,
    LanguageModelResult, LanguageModelStream, Message, ModelResponse, ModelUsage, Part, PartDelta,
    PartialModelResponse, TextPartDelta,
};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use std::collections::HashMap;

const PROVIDER: &str = "google";

pub struct GoogleModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
    headers: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct GoogleModelOptions {
    pub api_key: String,
    pub base_url: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub client: Option<Client>,
}

impl GoogleModel {
    #[must_use]
    pub fn new(model_id: impl Into<String>, options: GoogleModelOptions) -> Self {
        let GoogleModelOptions {
            api_key,
            base_url,
            headers,
            client,
        } = options;

        let base_url = base_url
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
            .trim_end_matches('/')
            .to_string();
        let client = client.unwrap_or_else(Client::new);
        let headers = headers.unwrap_or_default();

        Self {
            model_id: model_id.into(),
            api_key,
            base_url,
            client,
            headers,
        }
    }

    fn request_headers(&self) -> LanguageModelResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.api_key).map_err(|error| {
            LanguageModelError::InvalidInput(format!("Invalid Google API key: {error}"))
        })?;
        headers.insert("x-goog-api-key", api_key);

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|error| {
                LanguageModelError::InvalidInput(format!(
                    "Invalid Google header name '{key}': {error}"
                ))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|error| {
                LanguageModelError::InvalidInput(format!(
                    "Invalid Google header value for '{key}': {error}"
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait::async_trait]
impl LanguageModel for GoogleModel {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn generate(&self, input: LanguageModelInput) -> LanguageModelResult<ModelResponse> {
        crate::opentelemetry::trace_generate(
            self.provider(),
            &self.model_id,
            input,
            |input| async move {
                let params = convert_to_generate_content_parameters(input);

                let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);

                let headers = self.request_headers()?;
                let response: GenerateContentResponse =
                    client_utils::send_json(&self.client, &url, &params, headers).await?;

                if let Some(error) = response.error {
                    return Err(map_google_error(error));
                }

                let candidate = response
                    .candidates
                    .and_then(|c| c.into_iter().next())
                    .ok_or_else(|| {
                        LanguageModelError::Invariant(
                            PROVIDER,
                            "No candidate in response".to_string(),
                        )
                    })?;

                let content = map_google_content(
                    candidate.content.and_then(|c| c.parts).unwrap_or_default(),
                )?;

                Ok(ModelResponse {
                    content,
                    usage: response.usage_metadata.as_ref().map(map_google_usage_metadata),
                })
            },
        )
        .await
    }

    async fn stream(&self, input: LanguageModelInput) -> LanguageModelResult<LanguageModelStream> {
        crate::opentelemetry::trace_stream(
            self.provider(),
            &self.model_id,
            input,
            |input| async move {
                let params = convert_to_generate_content_parameters(input);

                let url = format!(
                    "{}/models/{}:streamGenerateContent?alt=sse",
                    self.base_url, self.model_id
                );

                let headers = self.request_headers()?;
                let mut chunk_stream = client_utils::send_sse_stream::<_, GenerateContentResponse>(
                    &self.client,
                    &url,
                    &params,
                    headers,
                    PROVIDER,
                )
                .await?;

                let stream = try_stream! {
                    while let Some(chunk) = chunk_stream.next().await {
                        let response = chunk?;

                        if let Some(error) = response.error {
                            Err(map_google_error(error))?;
                        }

                        let parts = response
                            .candidates
                            .and_then(|c| c.into_iter().next())
                            .and_then(|candidate| candidate.content)
                            .and_then(|content| content.parts)
                            .unwrap_or_default();

                        for delta in map_google_content_to_delta(parts)? {
                            yield PartialModelResponse {
                                delta: Some(delta),
                                usage: None,
                            };
                        }

                        if let Some(usage_metadata) = response.usage_metadata {
                            yield PartialModelResponse {
                                delta: None,
                                usage: Some(map_google_usage_metadata(&usage_metadata)),
                            };
                        }
                    }
                };

                Ok(LanguageModelStream::from_stream(stream))
            },
        )
        .await
    }
}

fn convert_to_generate_content_parameters(input: LanguageModelInput) -> GenerateContentParameters {
    let LanguageModelInput {
        system_prompt,
        messages,
        max_tokens,
        temperature,
        top_p,
        top_k,
        extra,
    } = input;

    GenerateContentParameters {
        contents: convert_to_google_contents(messages),
        system_instruction: system_prompt.map(|system_prompt| Content {
            role: Some("system".to_string()),
            parts: Some(vec![GooglePart {
                text: Some(system_prompt),
                ..Default::default()
            }]),
        }),
        generation_config: Some(GenerateContentConfig {
            temperature,
            top_p,
            top_k,
            max_output_tokens: max_tokens,
        }),
        extra,
    }
}

fn convert_to_google_contents(messages: Vec<Message>) -> Vec<Content> {
    messages
        .into_iter()
        .map(|message| {
            let (role, content) = match message {
                Message::User(user_message) => ("user", user_message.content),
                Message::Assistant(assistant_message) => ("model", assistant_message.content),
            };
            Content {
                role: Some(role.to_string()),
                parts: Some(content.into_iter().map(convert_to_google_part).collect()),
            }
        })
        .collect()
}

fn convert_to_google_part(part: Part) -> GooglePart {
    match part {
        Part::Text(text_part) => GooglePart {
            text: Some(text_part.text),
            ..Default::default()
        },
        Part::Image(image_part) => GooglePart {
            inline_data: Some(Blob {
                data: Some(image_part.image_data),
                mime_type: Some(image_part.mime_type),
            }),
            ..Default::default()
        },
    }
}

/// Thought parts are dropped: only the visible answer is surfaced.
fn map_google_content(parts: Vec<GooglePart>) -> LanguageModelResult<Vec<Part>> {
    parts
        .into_iter()
        .filter(|part| !part.thought.unwrap_or(false))
        .filter_map(|part| {
            if let Some(text) = part.text {
                Some(Ok(Part::text(text)))
            } else if let Some(inline_data) = part.inline_data {
                match (inline_data.data, inline_data.mime_type) {
                    (Some(data), Some(mime_type)) if mime_type.starts_with("image/") => {
                        Some(Ok(Part::Image(ImagePart::new(data, mime_type))))
                    }
                    (Some(_), Some(_)) => None,
                    _ => Some(Err(LanguageModelError::Invariant(
                        PROVIDER,
                        "Inline data missing data or mime type".to_string(),
                    ))),
                }
            } else {
                None
            }
        })
        .collect()
}

/// Gemini streams whole text fragments without indexes; every text fragment
/// continues the single text part at index 0.
fn map_google_content_to_delta(parts: Vec<GooglePart>) -> LanguageModelResult<Vec<ContentDelta>> {
    Ok(map_google_content(parts)?
        .into_iter()
        .filter_map(|part| match part {
            Part::Text(text_part) => Some(ContentDelta {
                index: 0,
                part: PartDelta::Text(TextPartDelta {
                    text: text_part.text,
                }),
            }),
            Part::Image(_) => None,
        })
        .collect())
}

/// Errors reported in a response body keep their HTTP code, so they read the
/// same as a failed request.
fn map_google_error(error: ApiError) -> LanguageModelError {
    let ApiError {
        code,
        message,
        status,
    } = error;
    let message = match (status, message) {
        (Some(status), Some(message)) => format!("{status}: {message}"),
        (Some(text), None) | (None, Some(text)) => text,
        (None, None) => "unknown error".to_string(),
    };

    match code.and_then(|code| reqwest::StatusCode::from_u16(code).ok()) {
        Some(status_code) => LanguageModelError::StatusCode(status_code, message),
        None => LanguageModelError::Invariant(PROVIDER, message),
    }
}

fn map_google_usage_metadata(usage: &GenerateContentResponseUsageMetadata) -> ModelUsage {
    ModelUsage {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0)
            + usage.thoughts_token_count.unwrap_or(0),
    }
}
