//! # manus-runtime
//!
//! Concrete pieces for running agents: LLM providers, built-in tools, and the
//! preconfigured manus agent.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manus_runtime::{OllamaProvider, manus_agent};
//!
//! let provider = Arc::new(OllamaProvider::from_env());
//! let agent = manus_agent(provider, ToolRegistry::new(), AgentConfig::from_env()?)?;
//! let log = agent.run("Summarize today's tasks").await?;
//! ```

pub mod manus;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod tools;

pub use manus::{MANUS_NEXT_STEP_PROMPT, MANUS_SYSTEM_PROMPT, manus_agent, manus_agent_with};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
pub use tools::TerminateTool;

// Re-export core types for convenience
pub use manus_core::{
    Agent, AgentConfig, AgentError, AgentState, LlmProvider, Message, Result, RunEvent, Role,
    Tool, ToolCallingStep, ToolRegistry,
};
