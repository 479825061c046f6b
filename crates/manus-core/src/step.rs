//! Step Contract
//!
//! A step is one think/act cycle. [`Step`] is the two-phase strategy the
//! driver is composed with; [`execute_step`] is the failure-isolation boundary
//! around it.

use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};

/// Summary returned when `think` decides nothing needs doing
pub const NO_ACTION_SUMMARY: &str = "Thought completed - no action required";

/// What a step sees of the running agent
pub struct StepContext<'a> {
    conversation: &'a mut Conversation,
    config: &'a AgentConfig,
    step: usize,
    finish_requested: bool,
}

impl<'a> StepContext<'a> {
    pub const fn new(conversation: &'a mut Conversation, config: &'a AgentConfig, step: usize) -> Self {
        Self {
            conversation,
            config,
            step,
            finish_requested: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        self.conversation
    }

    pub const fn config(&self) -> &AgentConfig {
        self.config
    }

    /// 1-based index of the step being executed
    pub const fn step(&self) -> usize {
        self.step
    }

    /// Ask the driver to move the run to `Finished` after this step.
    pub fn finish(&mut self) {
        self.finish_requested = true;
    }

    pub const fn finish_requested(&self) -> bool {
        self.finish_requested
    }
}

/// Two-phase reasoning/action strategy
#[async_trait]
pub trait Step: Send {
    /// Decide whether an action is required.
    async fn think(&mut self, ctx: &mut StepContext<'_>) -> Result<bool>;

    /// Perform the action decided on by `think` and summarize it.
    async fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<String>;
}

/// Run one think/act cycle and return its summary line.
///
/// `think() == false` finishes the run. Step-local errors are turned into the
/// summary: a failed `think` is also recorded as assistant content and
/// finishes the run, a failed `act` lets the run continue. Run-terminal errors
/// are returned to the driver.
pub async fn execute_step<S>(step: &mut S, ctx: &mut StepContext<'_>) -> Result<String>
where
    S: Step + ?Sized,
{
    match step.think(ctx).await {
        Ok(false) => {
            ctx.finish();
            Ok(NO_ACTION_SUMMARY.into())
        }
        Ok(true) => match step.act(ctx).await {
            Ok(summary) => Ok(summary),
            Err(e) if e.is_run_terminal() => Err(e),
            Err(e) => {
                let err = AgentError::StepExecution(format!("act failed: {e}"));
                tracing::error!(step = ctx.step(), error = %e, "Error while acting");
                Ok(err.to_string())
            }
        },
        Err(e) if e.is_run_terminal() => Err(e),
        Err(e) => {
            let err = AgentError::StepExecution(format!("think failed: {e}"));
            tracing::error!(step = ctx.step(), error = %e, "Error while thinking");
            ctx.conversation_mut().push(Message::assistant(err.to_string()));
            ctx.finish();
            Ok(err.to_string())
        }
    }
}
