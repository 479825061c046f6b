//! Reasoning Engine
//!
//! The collaborator that turns the current conversation into the next
//! assistant utterance, optionally carrying proposed tool calls.
//! [`ProviderReasoningEngine`] implements it over any [`LlmProvider`] using a
//! fenced-JSON tool call protocol:
//!
//! ````text
//! ```tool
//! {"tool": "tool_name", "arguments": {"arg1": "value1"}}
//! ```
//! ````

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCallRequest, ToolRegistry};

/// Assistant output for one think phase
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    /// Proposed calls, in execution order
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_calls(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn to_message(&self) -> Message {
        Message::assistant_with_calls(&self.text, self.tool_calls.clone())
    }

    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.text, self.tool_calls)
    }
}

/// Produces the next assistant reply from conversation context
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn invoke(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        catalog: &ToolRegistry,
    ) -> Result<AssistantReply>;
}

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// Reasoning engine backed by a chat-completion provider
pub struct ProviderReasoningEngine {
    provider: Arc<dyn LlmProvider>,
    generation: GenerationOptions,
}

impl ProviderReasoningEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, generation: GenerationOptions) -> Self {
        Self {
            provider,
            generation,
        }
    }

    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(system_prompt: &str, catalog: &ToolRegistry) -> String {
        let mut prompt = system_prompt.to_string();

        if !catalog.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&catalog.generate_prompt_section());
        }

        prompt
    }

    /// Render the conversation the way the model sees it: the system prompt
    /// first, assistant calls as fenced blocks, tool results as plain text.
    fn prepare_messages(system_prompt: String, conversation: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(system_prompt));

        for message in conversation {
            let prepared = match message {
                Message::System { .. } => continue,
                Message::User { .. } => message.clone(),
                Message::Assistant { text, tool_calls } if tool_calls.is_empty() => {
                    Message::assistant(text)
                }
                Message::Assistant { text, tool_calls } => {
                    Message::assistant(render_calls(text, tool_calls))
                }
                Message::Tool {
                    tool_name,
                    result_data,
                    call_id,
                } => Message::tool(
                    tool_name,
                    format!("[Tool '{tool_name}' returned]\n{result_data}"),
                    call_id.clone(),
                ),
            };
            messages.push(prepared);
        }

        messages
    }
}

fn render_calls(text: &str, calls: &[ToolCallRequest]) -> String {
    use std::fmt::Write;

    let mut rendered = text.to_string();
    // Replies parsed from model output already carry their blocks
    if text.contains(TOOL_FENCE) {
        return rendered;
    }
    for call in calls {
        let block = serde_json::json!({"tool": call.name, "arguments": call.arguments});
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        let _ = write!(rendered, "{TOOL_FENCE}\n{block}\n{FENCE_END}");
    }
    rendered
}

/// Extract every tool call from an LLM response, in order of appearance.
pub fn parse_tool_calls(content: &str) -> Vec<ToolCallRequest> {
    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start_idx) = rest.find(TOOL_FENCE) {
        let after_marker = &rest[start_idx + TOOL_FENCE.len()..];
        let Some(end_idx) = after_marker.find(FENCE_END) else {
            break;
        };

        let json_str = after_marker[..end_idx].trim();
        match serde_json::from_str::<ToolCallRequest>(json_str) {
            Ok(call) => calls.push(call),
            Err(e) => tracing::debug!(error = %e, "Skipping malformed tool block"),
        }
        rest = &after_marker[end_idx + FENCE_END.len()..];
    }

    if calls.is_empty() {
        calls.extend(parse_inline_tool_call(content));
    }

    for call in &mut calls {
        if call.id.is_none() {
            call.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }
    calls
}

/// Try to parse a bare JSON object with a "tool" field
fn parse_inline_tool_call(content: &str) -> Option<ToolCallRequest> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCallRequest>(&content[start..=end]).ok()
}

#[async_trait]
impl ReasoningEngine for ProviderReasoningEngine {
    async fn invoke(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        catalog: &ToolRegistry,
    ) -> Result<AssistantReply> {
        let prompt = Self::build_system_prompt(system_prompt, catalog);
        let messages = Self::prepare_messages(prompt, conversation);

        let completion = self.provider.complete(&messages, &self.generation).await?;
        let tool_calls = parse_tool_calls(&completion.content);

        tracing::debug!(
            model = %completion.model,
            tool_calls = tool_calls.len(),
            "Reasoning engine replied"
        );

        Ok(AssistantReply {
            text: completion.content,
            tool_calls,
        })
    }
}
