//! Agent State Machine
//!
//! `Idle -> Running -> Finished | Error`. The state lives in an atomic cell so
//! that run entry is a single compare-and-swap: two callers racing on an idle
//! agent cannot both start a run.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of an agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum AgentState {
    /// Ready to accept a run
    Idle = 0,
    /// A run is in progress
    Running = 1,
    /// Run ended normally
    Finished = 2,
    /// Run ended with a failure, timeout or cancellation
    Error = 3,
}

impl AgentState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Finished,
            _ => Self::Error,
        }
    }

    /// Finished and Error end a run.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Atomic holder for [`AgentState`]
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self::new(AgentState::Idle)
    }
}

impl StateCell {
    pub const fn new(state: AgentState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> AgentState {
        AgentState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: AgentState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Transition `from -> to` only if the current state is `from`.
    ///
    /// Returns the observed state on failure.
    pub fn transition(&self, from: AgentState, to: AgentState) -> Result<(), AgentState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(AgentState::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_transition() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), AgentState::Idle);

        assert!(cell.transition(AgentState::Idle, AgentState::Running).is_ok());
        assert_eq!(
            cell.transition(AgentState::Idle, AgentState::Running),
            Err(AgentState::Running)
        );

        cell.set(AgentState::Finished);
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn test_single_winner() {
        let cell = Arc::new(StateCell::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    cell.transition(AgentState::Idle, AgentState::Running).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&AgentState::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
    }
}
