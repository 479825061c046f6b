//! Application State

use std::sync::Arc;

use manus_core::{AgentConfig, GenerationOptions, LlmProvider, ToolRegistry};

/// Shared application state
///
/// Agents are stateful and single-run, so every request builds its own from
/// these parts.
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Ollama, etc.)
    pub provider: Arc<dyn LlmProvider>,

    /// Tools offered to every agent
    pub tools: Arc<ToolRegistry>,

    /// Loop settings applied to every agent
    pub config: AgentConfig,

    /// Default generation options; requests may override the model
    pub generation: GenerationOptions,
}
