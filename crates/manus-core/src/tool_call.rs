//! Tool-Calling Step
//!
//! The concrete [`Step`]: think asks the reasoning engine what to do next,
//! act runs the proposed tool calls through the executor. A reply without
//! tool calls ends the run; so does a call to the termination tool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::reasoning::{AssistantReply, ProviderReasoningEngine, ReasoningEngine};
use crate::step::{Step, StepContext};
use crate::tool::{RegistryToolExecutor, ToolExecutor, ToolRegistry};

/// Summary returned by `act` when no tool calls are pending
pub const NO_TOOL_NEEDED: &str = "no tool needed";

/// Step that drives a reasoning engine and a tool executor
pub struct ToolCallingStep {
    engine: Arc<dyn ReasoningEngine>,
    executor: Arc<dyn ToolExecutor>,
    catalog: Arc<ToolRegistry>,
    pending: Option<AssistantReply>,
}

impl ToolCallingStep {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        executor: Arc<dyn ToolExecutor>,
        catalog: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            engine,
            executor,
            catalog,
            pending: None,
        }
    }

    /// Provider-backed engine and registry-backed executor over the same tools
    pub fn from_provider(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        generation: GenerationOptions,
    ) -> Self {
        let engine = Arc::new(ProviderReasoningEngine::new(provider, generation));
        let executor = Arc::new(RegistryToolExecutor::new(tools.clone()));
        Self::new(engine, executor, tools)
    }
}

#[async_trait]
impl Step for ToolCallingStep {
    async fn think(&mut self, ctx: &mut StepContext<'_>) -> Result<bool> {
        self.pending = None;

        if let Some(prompt) = ctx.config().next_step_prompt.clone() {
            ctx.conversation_mut().push(Message::user(prompt));
        }

        let reply = self
            .engine
            .invoke(
                ctx.conversation().messages(),
                &ctx.config().system_prompt,
                &self.catalog,
            )
            .await?;

        tracing::info!(
            agent = %ctx.config().name,
            thought = %reply.text,
            tool_calls = reply.tool_calls.len(),
            "Agent thought"
        );
        for call in &reply.tool_calls {
            tracing::debug!(tool = %call.name, arguments = %call.arguments, "Tool selected");
        }

        if !reply.has_tool_calls() {
            ctx.conversation_mut().push(reply.into_message());
            return Ok(false);
        }

        self.pending = Some(reply);
        Ok(true)
    }

    async fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        let Some(reply) = self.pending.take() else {
            return Ok(NO_TOOL_NEEDED.into());
        };

        let execution = self
            .executor
            .execute_all(ctx.conversation(), &reply)
            .await?;
        let terminated = execution.terminated();

        let summary = execution
            .outcomes
            .iter()
            .map(|o| format!("Tool {} returned: {}", o.tool_name, o.result_data))
            .collect::<Vec<_>>()
            .join("\n");
        ctx.conversation_mut().replace(execution.conversation);

        if terminated {
            tracing::info!(agent = %ctx.config().name, "Termination tool called");
            ctx.finish();
        }

        Ok(summary)
    }
}

/// Builder for a tool-calling agent
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
    generation: GenerationOptions,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
            generation: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    pub fn build(self) -> Result<Agent<ToolCallingStep>> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        let step = ToolCallingStep::from_provider(provider, Arc::new(self.tools), self.generation);
        Agent::new(self.config, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Conversation, Role};
    use crate::state::AgentState;
    use crate::tool::{TERMINATE_TOOL, ToolCallRequest, ToolExecution, ToolOutcome};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records the conversations it was shown.
    #[derive(Default)]
    struct ScriptedEngine {
        replies: Mutex<VecDeque<Result<AssistantReply>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedEngine {
        fn new(replies: Vec<Result<AssistantReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn invoke(
            &self,
            conversation: &[Message],
            _system_prompt: &str,
            _catalog: &ToolRegistry,
        ) -> Result<AssistantReply> {
            self.seen.lock().unwrap().push(conversation.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(AssistantReply::text("done")))
        }
    }

    /// Answers every call with "ok:<name>".
    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute_all(
            &self,
            conversation: &Conversation,
            reply: &AssistantReply,
        ) -> Result<ToolExecution> {
            let mut updated = conversation.clone();
            updated.push(reply.to_message());
            let mut outcomes = Vec::new();
            for call in &reply.tool_calls {
                let result_data = format!("ok:{}", call.name);
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

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest::new(name, serde_json::json!({}))
    }

    fn step(engine: Arc<ScriptedEngine>) -> ToolCallingStep {
        ToolCallingStep::new(engine, Arc::new(EchoExecutor), Arc::new(ToolRegistry::new()))
    }

    #[tokio::test]
    async fn test_act_without_pending_reply() {
        let mut step = step(ScriptedEngine::new(vec![]));
        let config = AgentConfig::default();
        let mut conv = Conversation::new();
        let mut ctx = StepContext::new(&mut conv, &config, 1);

        let summary = step.act(&mut ctx).await.unwrap();
        assert_eq!(summary, NO_TOOL_NEEDED);
        assert!(!ctx.finish_requested());
        assert!(ctx.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_think_without_calls_records_reply() {
        let engine = ScriptedEngine::new(vec![Ok(AssistantReply::text("All done."))]);
        let mut step = step(engine.clone());
        let config = AgentConfig::default().next_step_prompt("What next?");
        let mut conv = Conversation::new();
        conv.push(Message::user("task"));
        let mut ctx = StepContext::new(&mut conv, &config, 1);

        assert!(!step.think(&mut ctx).await.unwrap());
        assert!(step.pending.is_none());

        let roles: Vec<_> = ctx.conversation().messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::User, Role::User, Role::Assistant]);

        // The engine saw the continuation prompt
        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen[0].last(), Some(&Message::user("What next?")));
    }

    #[tokio::test]
    async fn test_think_with_calls_defers_reply() {
        let engine = ScriptedEngine::new(vec![Ok(AssistantReply::with_calls(
            "",
            vec![call("search")],
        ))]);
        let mut step = step(engine);
        let config = AgentConfig::default();
        let mut conv = Conversation::new();
        conv.push(Message::user("task"));
        let mut ctx = StepContext::new(&mut conv, &config, 1);

        assert!(step.think(&mut ctx).await.unwrap());
        assert!(step.pending.is_some());
        assert_eq!(ctx.conversation().len(), 1);

        let summary = step.act(&mut ctx).await.unwrap();
        assert_eq!(summary, "Tool search returned: ok:search");
        assert_eq!(ctx.conversation().len(), 3);
        assert!(!ctx.finish_requested());
        assert!(step.pending.is_none());
    }

    #[tokio::test]
    async fn test_terminate_tool_finishes() {
        let engine = ScriptedEngine::new(vec![Ok(AssistantReply::with_calls(
            "wrapping up",
            vec![call("search"), call(TERMINATE_TOOL)],
        ))]);
        let mut step = step(engine);
        let config = AgentConfig::default();
        let mut conv = Conversation::new();
        let mut ctx = StepContext::new(&mut conv, &config, 1);

        assert!(step.think(&mut ctx).await.unwrap());
        let summary = step.act(&mut ctx).await.unwrap();
        assert_eq!(
            summary,
            "Tool search returned: ok:search\nTool terminate returned: ok:terminate"
        );
        assert!(ctx.finish_requested());
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = ScriptedEngine::new(vec![Err(AgentError::Provider("offline".into()))]);
        let mut step = step(engine);
        let config = AgentConfig::default();
        let mut conv = Conversation::new();
        let mut ctx = StepContext::new(&mut conv, &config, 1);

        assert!(step.think(&mut ctx).await.is_err());
        assert!(step.pending.is_none());
    }

    #[tokio::test]
    async fn test_agent_runs_until_terminate() {
        let engine = ScriptedEngine::new(vec![
            Ok(AssistantReply::with_calls("", vec![call("search")])),
            Ok(AssistantReply::with_calls("", vec![call(TERMINATE_TOOL)])),
        ]);
        let agent = Agent::new(AgentConfig::new("manus").max_steps(10), step(engine)).unwrap();

        let log = agent.run("find it").await.unwrap();
        assert_eq!(
            log,
            "Step 1: Tool search returned: ok:search\nStep 2: Tool terminate returned: ok:terminate"
        );
        assert_eq!(agent.state(), AgentState::Finished);
    }

    #[tokio::test]
    async fn test_agent_think_failure_ends_run() {
        let engine = ScriptedEngine::new(vec![Err(AgentError::Provider("offline".into()))]);
        let agent = Agent::new(AgentConfig::new("manus"), step(engine)).unwrap();

        let log = agent.run("find it").await.unwrap();
        assert_eq!(
            log,
            "Step 1: Step execution error: think failed: Provider error: offline"
        );
        assert_eq!(agent.state(), AgentState::Finished);
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = AgentBuilder::new().config(AgentConfig::new("manus")).build().err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        struct Offline;

        #[async_trait]
        impl LlmProvider for Offline {
            async fn health_check(&self) -> Result<bool> {
                Ok(false)
            }

            async fn complete(
                &self,
                _messages: &[Message],
                _options: &GenerationOptions,
            ) -> Result<crate::provider::Completion> {
                Err(AgentError::ProviderUnavailable("offline".into()))
            }

            async fn list_models(&self) -> Result<Vec<crate::provider::ModelInfo>> {
                Ok(vec![])
            }
        }

        let err = AgentBuilder::new()
            .provider(Arc::new(Offline))
            .config(AgentConfig::new("manus").max_steps(0))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
