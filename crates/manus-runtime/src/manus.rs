//! Preconfigured general-purpose agent

use std::sync::Arc;

use manus_core::{
    Agent, AgentBuilder, AgentConfig, GenerationOptions, LlmProvider, Result, TERMINATE_TOOL,
    ToolCallingStep, ToolRegistry,
};

use crate::tools::TerminateTool;

pub const MANUS_SYSTEM_PROMPT: &str = "You are Manus, an all-capable AI assistant, aimed at \
solving any task presented by the user. You have various tools at your disposal that you can \
call upon to efficiently complete complex requests.";

pub const MANUS_NEXT_STEP_PROMPT: &str = "Based on user needs, proactively select the most \
appropriate tool or combination of tools. For complex tasks, you can break down the problem \
and use different tools step by step to solve it. After using each tool, clearly explain the \
execution results and suggest the next steps. If you want to stop the interaction at any \
point, use the `terminate` tool/function call.";

/// Build a manus agent with default generation options.
pub fn manus_agent(
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    config: AgentConfig,
) -> Result<Arc<Agent<ToolCallingStep>>> {
    manus_agent_with(provider, tools, config, GenerationOptions::default())
}

/// Build a manus agent.
///
/// Prompts left unset in `config` get the manus defaults, and the termination
/// tool is registered unless the catalog already has one.
pub fn manus_agent_with(
    provider: Arc<dyn LlmProvider>,
    mut tools: ToolRegistry,
    mut config: AgentConfig,
    generation: GenerationOptions,
) -> Result<Arc<Agent<ToolCallingStep>>> {
    if config.system_prompt.trim().is_empty() {
        config.system_prompt = MANUS_SYSTEM_PROMPT.into();
    }
    if config.next_step_prompt.is_none() {
        config.next_step_prompt = Some(MANUS_NEXT_STEP_PROMPT.into());
    }
    if !tools.contains(TERMINATE_TOOL) {
        tools.register(TerminateTool);
    }

    tracing::debug!(agent = %config.name, tools = tools.len(), model = %generation.model, "Building manus agent");

    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(tools)
        .config(config)
        .generation(generation)
        .build()?;
    Ok(Arc::new(agent))
}
