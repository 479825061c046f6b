//! Run Events
//!
//! What a run reports as it progresses. Blocking runs collect the event lines
//! into the returned log; streaming runs push the events through a bounded
//! channel for the transport to forward.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Why the driver ended a run on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Step budget exhausted
    MaxSteps,
    /// Too many consecutive stuck detections
    RepeatedLoop,
}

/// Events emitted by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// One step completed: `"Step N: <summary>"`
    Step { step: usize, text: String },

    /// Loop detection fired for this step
    Warning { step: usize, text: String },

    /// The driver forced the run to finish
    Terminated {
        step: usize,
        reason: TerminationReason,
        text: String,
    },

    /// The run could not start or failed; always the last event
    Failed { text: String },

    /// The run finished normally; always the last event
    Completed,
}

impl RunEvent {
    pub fn step(step: usize, summary: &str) -> Self {
        Self::Step {
            step,
            text: format!("Step {step}: {summary}"),
        }
    }

    pub fn loop_warning(step: usize) -> Self {
        Self::Warning {
            step,
            text: format!("Warning: Detected loop at step {step}"),
        }
    }

    pub fn repeated_loop(step: usize) -> Self {
        Self::Terminated {
            step,
            reason: TerminationReason::RepeatedLoop,
            text: "Terminated: Repeated loop detected.".into(),
        }
    }

    pub fn max_steps(step: usize, max_steps: usize) -> Self {
        Self::Terminated {
            step,
            reason: TerminationReason::MaxSteps,
            text: format!("Terminated: Reached max steps ({max_steps})"),
        }
    }

    pub fn failed(err: &AgentError) -> Self {
        let text = if err.is_precondition() {
            format!("Error: {err}")
        } else {
            format!("Error running agent: {err}")
        };
        Self::Failed { text }
    }

    /// SSE event name for this event type.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Step { .. } => "step",
            Self::Warning { .. } => "warning",
            Self::Terminated { .. } => "terminated",
            Self::Failed { .. } => "failed",
            Self::Completed => "completed",
        }
    }

    /// Log line carried by the event
    pub fn line(&self) -> Option<&str> {
        match self {
            Self::Step { text, .. }
            | Self::Warning { text, .. }
            | Self::Terminated { text, .. }
            | Self::Failed { text } => Some(text),
            Self::Completed => None,
        }
    }

    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Completed)
    }
}
