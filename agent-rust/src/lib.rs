mod config;
mod errors;
pub mod graph;
pub mod instruction;
mod intent;
pub mod nodes;
mod opentelemetry;
mod params;
mod server;
mod state;
mod types;
mod workflow;

pub use config::AgentConfig;
pub use errors::{BoxedError, ConfigError, WorkflowError};
pub use intent::Intent;
pub use params::WorkflowParams;
pub use server::{create_router, output_body, GenerateRequest, CHAT_MARKER, CODE_MARKER};
pub use state::WorkflowState;
pub use types::*;
pub use workflow::Workflow;
