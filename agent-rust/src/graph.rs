//! Nodes and edges of the workflow state machine.
//!
//! ```text
//! ClassifyIntent ──chat──────────────► Chat ──► end
//!        │
//!        └─code_generation──► PrepareCodePrompt ──► GenerateCode ──success──► end
//!                                                      ▲      │
//!                                                      │      └─error──► HandleError ──► end
//!                                                      └──────retry──────────┘
//! ```

use crate::Intent;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    ClassifyIntent,
    Chat,
    PrepareCodePrompt,
    GenerateCode,
    HandleError,
}

impl Node {
    pub const ENTRY: Self = Self::ClassifyIntent;

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ClassifyIntent => "classify_intent",
            Self::Chat => "chat",
            Self::PrepareCodePrompt => "prepare_code_prompt",
            Self::GenerateCode => "generate_code",
            Self::HandleError => "handle_error",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Node),
    End,
}

/// Most retries a run may schedule after overloaded generations.
pub const MAX_RETRIES: u32 = 3;

/// Result of the latest code generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success,
    /// The model reported it is overloaded; trying again may succeed.
    TransientError,
    FatalError,
}

impl GenerationOutcome {
    #[must_use]
    pub fn from_error(error_message: Option<&str>) -> Self {
        match error_message {
            None => Self::Success,
            Some(message) if is_overloaded(message) => Self::TransientError,
            Some(_) => Self::FatalError,
        }
    }
}

/// An overload is reported as a 503 whose text mentions "overloaded".
#[must_use]
pub fn is_overloaded(error_message: &str) -> bool {
    error_message.contains("503") && error_message.contains("overloaded")
}

#[must_use]
pub fn route_intent(intent: Intent) -> Transition {
    match intent {
        Intent::Chat => Transition::Next(Node::Chat),
        Intent::CodeGeneration => Transition::Next(Node::PrepareCodePrompt),
    }
}

#[must_use]
pub fn route_generation(outcome: GenerationOutcome) -> Transition {
    match outcome {
        GenerationOutcome::Success => Transition::End,
        GenerationOutcome::TransientError | GenerationOutcome::FatalError => {
            Transition::Next(Node::HandleError)
        }
    }
}

/// Upper bound on node executions for a run allowing `max_retries` retries:
/// classification and prompt preparation, plus a generation and an error
/// handling step per attempt.
#[must_use]
pub fn step_limit(max_retries: u32) -> usize {
    let attempts = usize::try_from(max_retries).unwrap_or(usize::MAX).saturating_add(1);
    attempts.saturating_mul(2).saturating_add(2)
}
