//! Built-in tools

use async_trait::async_trait;
use manus_core::{
    error::Result,
    tool::{TERMINATE_TOOL, Tool, ToolCallRequest, ToolResult, ToolSchema},
};

/// Ends the run when the model decides the task is done.
///
/// The tool itself only acknowledges; the tool-calling step notices the call
/// by name and finishes the agent.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TERMINATE_TOOL.into(),
            description: "Terminate the interaction when the request is met OR if the \
                          assistant cannot proceed further with the task. When you have \
                          finished all the tasks, call this tool to end the work."
                .into(),
            parameters: Vec::new(),
        }
    }

    async fn execute(&self, _call: &ToolCallRequest) -> Result<ToolResult> {
        Ok(ToolResult::success(TERMINATE_TOOL, "Task ended"))
    }
}
