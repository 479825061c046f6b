//! Tool System
//!
//! Tool catalog and the executor the tool-calling step dispatches through.
//! The core never implements a concrete tool; it only reserves the name of the
//! termination tool that lets an agent end its own task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::reasoning::AssistantReply;

/// Name of the tool whose invocation deliberately ends a run
pub const TERMINATE_TOOL: &str = "terminate";

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments payload (a JSON object for well-formed calls)
    #[serde(default)]
    pub arguments: serde_json::Value,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    /// Look up a named argument
    pub fn argument(&self, key: &str) -> Option<&serde_json::Value> {
        self.arguments.get(key)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            output: error.into(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCallRequest) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCallRequest) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && call.argument(&param.name).is_none() {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Catalog of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool call
    pub async fn execute(&self, call: &ToolCallRequest) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;
        tool.execute(call).await
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        use std::fmt::Write;

        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with one JSON block per call:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for schema in self.schemas() {
            let _ = writeln!(prompt, "### {}", schema.name);
            let _ = writeln!(prompt, "{}", schema.description);

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    let _ = writeln!(
                        prompt,
                        "- `{}` ({}){}: {}",
                        param.name, param.param_type, required, param.description
                    );
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

/// One executed call, addressable by tool name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub result_data: String,
}

/// What the executor hands back to the tool-calling step
#[derive(Clone, Debug)]
pub struct ToolExecution {
    /// Input conversation + assistant call message + one tool message per call
    pub conversation: Conversation,
    /// Per-call results, in call order
    pub outcomes: Vec<ToolOutcome>,
}

impl ToolExecution {
    pub fn terminated(&self) -> bool {
        self.outcomes.iter().any(|o| o.tool_name == TERMINATE_TOOL)
    }
}

/// Performs every call proposed in an assistant reply
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_all(
        &self,
        conversation: &Conversation,
        reply: &AssistantReply,
    ) -> Result<ToolExecution>;
}

/// Executes calls one after another against a [`ToolRegistry`].
///
/// A failing call does not fail the batch: its error text becomes the result
/// data so the model can see it and recover.
pub struct RegistryToolExecutor {
    tools: Arc<ToolRegistry>,
}

impl RegistryToolExecutor {
    pub const fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    async fn execute_one(&self, call: &ToolCallRequest) -> String {
        match self.tools.execute(call).await {
            Ok(result) if result.success => result.output,
            Ok(result) => format!("Error: {}", result.output),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Error: {e}")
            }
        }
    }
}

#[async_trait]
impl ToolExecutor for RegistryToolExecutor {
    async fn execute_all(
        &self,
        conversation: &Conversation,
        reply: &AssistantReply,
    ) -> Result<ToolExecution> {
        let mut updated = conversation.clone();
        updated.push(reply.to_message());

        let mut outcomes = Vec::with_capacity(reply.tool_calls.len());
        for call in &reply.tool_calls {
            tracing::debug!(tool = %call.name, "Executing tool");
            let result_data = self.execute_one(call).await;

            updated.push(Message::tool(&call.name, &result_data, call.id.clone()));
            outcomes.push(ToolOutcome {
                tool_name: call.name.clone(),
                result_data,
            });
        }

        Ok(ToolExecution {
            conversation: updated,
            outcomes,
        })
    }
}
