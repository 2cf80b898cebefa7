use crate::{Intent, WorkflowError};
use codecanvas_sdk::{LanguageModelResult, LanguageModelStream};
use futures::{stream, Stream, StreamExt};
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

/// A lazily polled sequence of text tokens produced by a model.
/// Tokens are only requested when the consumer polls, and dropping the stream
/// cancels the underlying model request.
pub struct TokenStream(Pin<Box<dyn Stream<Item = LanguageModelResult<String>> + Send>>);

impl TokenStream {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = LanguageModelResult<String>> + Send + 'static,
    {
        Self(Box::pin(stream))
    }

    /// Keep the non-empty text deltas of a model stream.
    #[must_use]
    pub fn from_model_stream(stream: LanguageModelStream) -> Self {
        Self::from_stream(stream.filter_map(|partial| async move {
            match partial {
                Ok(partial) => partial
                    .text_delta()
                    .filter(|text| !text.is_empty())
                    .map(|text| Ok(text.to_string())),
                Err(error) => Some(Err(error)),
            }
        }))
    }

    /// A stream made of one already-known text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_stream(stream::iter([Ok(text.into())]))
    }

    /// Put an already-pulled token back in front of the rest.
    #[must_use]
    pub fn prepend(self, token: String) -> Self {
        Self::from_stream(stream::iter([Ok(token)]).chain(self))
    }
}

impl Stream for TokenStream {
    type Item = LanguageModelResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenStream")
    }
}

/// Output of the code generation branch.
#[derive(Debug)]
pub enum GeneratedCode {
    /// Code tokens as the model produces them.
    Stream(TokenStream),
    /// A final message replacing the code, e.g. after an unrecoverable error.
    Message(String),
}

impl GeneratedCode {
    #[must_use]
    pub fn into_tokens(self) -> TokenStream {
        match self {
            Self::Stream(tokens) => tokens,
            Self::Message(message) => TokenStream::from_text(message),
        }
    }
}

/// The terminal output of a workflow run.
#[derive(Debug)]
pub enum WorkflowOutput {
    Chat(TokenStream),
    Code(GeneratedCode),
}

/// Emitted each time a node of the workflow completes.
#[derive(Debug)]
pub enum WorkflowEvent {
    IntentClassified(Intent),
    CodePromptPrepared { part_count: usize },
    GenerationFailed { attempt: u32, error: String },
    RetryScheduled { retry_count: u32 },
    /// Always the last event of a successful run.
    Output(WorkflowOutput),
}

pub struct WorkflowStream(Pin<Box<dyn Stream<Item = Result<WorkflowEvent, WorkflowError>> + Send>>);

impl WorkflowStream {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<WorkflowEvent, WorkflowError>> + Send + 'static,
    {
        Self(Box::pin(stream))
    }
}

impl Stream for WorkflowStream {
    type Item = Result<WorkflowEvent, WorkflowError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}
