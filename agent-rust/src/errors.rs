use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Language model error: {0}")]
    LanguageModel(#[from] codecanvas_sdk::LanguageModelError),
    #[error("Invariant: {0}")]
    Invariant(String),
    #[error("The maximum number of workflow steps ({0}) has been exceeded.")]
    MaxStepsExceeded(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;
