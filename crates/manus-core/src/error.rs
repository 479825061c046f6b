//! Error Types

use std::time::Duration;

use thiserror::Error;

use crate::state::AgentState;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Run requested while the agent is not idle
    #[error("Cannot run agent from state: {0}")]
    InvalidState(AgentState),

    /// Bad caller input (e.g. blank prompt)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure inside a single think/act step
    #[error("Step execution error: {0}")]
    StepExecution(String),

    /// Failure that aborts the whole run
    #[error("Run failure: {0}")]
    RunFailure(String),

    /// Streaming run made no progress within the inactivity window
    #[error("Timed out after {0:?} without progress")]
    Timeout(Duration),

    /// Streaming run cancelled by its consumer
    #[error("Run cancelled")]
    Cancelled,

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Errors that must not be absorbed at the step boundary.
    pub const fn is_run_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunFailure(_) | Self::Timeout(_) | Self::Cancelled
        )
    }

    /// Precondition failures reported before a run starts.
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::InvalidArgument(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidState(state) => format!("The agent is busy (state: {state})."),
            Self::InvalidArgument(msg) => format!("Invalid request: {msg}"),
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::Timeout(_) => "The agent stopped making progress and was timed out.".into(),
            Self::Cancelled => "The request was cancelled.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
