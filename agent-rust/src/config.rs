use crate::{errors::ConfigError, graph::MAX_RETRIES, Workflow, WorkflowParams};
use codecanvas_sdk::google::{GoogleModel, GoogleModelOptions};
use std::{env, str::FromStr, sync::Arc};

pub const DEFAULT_CLASSIFIER_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_CODE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Server settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub api_key: String,
    /// Overrides the Gemini API base URL, e.g. to target a proxy.
    pub base_url: Option<String>,
    pub classifier_model: String,
    pub chat_model: String,
    pub code_model: String,
    pub max_retries: u32,
    pub port: u16,
    /// Origin of the frontend allowed by CORS.
    pub app_url: String,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        Ok(Self {
            api_key,
            base_url: get("GEMINI_BASE_URL"),
            classifier_model: get("CLASSIFIER_MODEL")
                .unwrap_or_else(|| DEFAULT_CLASSIFIER_MODEL.to_string()),
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            code_model: get("CODE_MODEL").unwrap_or_else(|| DEFAULT_CODE_MODEL.to_string()),
            max_retries: parse_max_retries(get("MAX_RETRIES"))?,
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            app_url: get("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
        })
    }

    /// Create the Gemini-backed workflow. The three models share one HTTP
    /// connection pool.
    #[must_use]
    pub fn build_workflow(&self) -> Workflow {
        let options = GoogleModelOptions {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            client: Some(reqwest::Client::new()),
            ..Default::default()
        };
        let model = |model_id: &str| Arc::new(GoogleModel::new(model_id, options.clone()));

        WorkflowParams::new("codecanvas", model(self.code_model.as_str()))
            .classifier_model(model(self.classifier_model.as_str()))
            .chat_model(model(self.chat_model.as_str()))
            .max_retries(self.max_retries)
            .build()
    }
}

fn parse_max_retries(value: Option<String>) -> Result<u32, ConfigError> {
    let max_retries = parse_or("MAX_RETRIES", value, MAX_RETRIES)?;
    if max_retries > MAX_RETRIES {
        return Err(ConfigError::Invalid {
            name: "MAX_RETRIES",
            message: format!("must be at most {MAX_RETRIES}, got {max_retries}"),
        });
    }
    Ok(max_retries)
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::Invalid {
                name,
                message: err.to_string(),
            }),
    }
}
