//! # manus-core
//!
//! Step-driven agent framework: a control loop that runs think/act steps under
//! a step budget and loop detection, with a tool-calling step on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Agent<S: Step>                          │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────┐   │
//! │  │ StateCell   │  │ Control loop │  │  Loop detection    │   │
//! │  │ (CAS entry) │──│ run / stream │──│  (stuck counter)   │   │
//! │  └─────────────┘  └──────┬───────┘  └────────────────────┘   │
//! └──────────────────────────┼───────────────────────────────────┘
//!                            │ think / act
//! ┌──────────────────────────▼───────────────────────────────────┐
//! │                    ToolCallingStep                           │
//! │  ┌──────────────────┐  ┌──────────────┐  ┌───────────────┐   │
//! │  │ ReasoningEngine  │──│ ToolExecutor │──│ ToolRegistry  │   │
//! │  │ (LlmProvider)    │  │              │  │               │   │
//! │  └──────────────────┘  └──────────────┘  └───────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the loop independent of the model backend;
//! `ReasoningEngine` and `ToolExecutor` are the seams tests stub out.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod loop_detect;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod state;
pub mod step;
pub mod tool;
pub mod tool_call;

pub use agent::{Agent, AgentRuntime, RunStream};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use event::{RunEvent, TerminationReason};
pub use message::{Conversation, Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{AssistantReply, ProviderReasoningEngine, ReasoningEngine};
pub use state::AgentState;
pub use step::{Step, StepContext};
pub use tool::{
    TERMINATE_TOOL, Tool, ToolCallRequest, ToolExecutor, ToolRegistry, ToolResult, ToolSchema,
};
pub use tool_call::{AgentBuilder, ToolCallingStep};
