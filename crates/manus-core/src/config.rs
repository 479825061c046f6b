//! Agent Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Immutable per-agent settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Display name used in logs
    pub name: String,

    /// System prompt sent with every reasoning call
    pub system_prompt: String,

    /// Continuation prompt appended as a user message before each think phase
    pub next_step_prompt: Option<String>,

    /// Step budget per run
    pub max_steps: usize,

    /// Length of an identical assistant-text run that counts as stuck
    pub duplicate_threshold: usize,

    /// How many trailing messages loop detection looks at
    pub check_range: usize,

    /// Consecutive stuck detections tolerated before the run is ended
    pub stuck_limit: usize,

    /// Streaming runs fail after this long without a step completing
    #[serde(with = "duration_secs")]
    pub stream_timeout: Duration,

    /// Capacity of the streaming event channel
    pub event_buffer: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".into(),
            system_prompt: String::new(),
            next_step_prompt: None,
            max_steps: 10,
            duplicate_threshold: 4,
            check_range: 6,
            stuck_limit: 4,
            stream_timeout: Duration::from_secs(300),
            event_buffer: 32,
        }
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `MANUS_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse("MANUS_MAX_STEPS")? {
            config.max_steps = v;
        }
        if let Some(v) = env_parse("MANUS_DUPLICATE_THRESHOLD")? {
            config.duplicate_threshold = v;
            config.stuck_limit = v;
        }
        if let Some(v) = env_parse("MANUS_CHECK_RANGE")? {
            config.check_range = v;
        }
        if let Some(v) = env_parse("MANUS_STUCK_LIMIT")? {
            config.stuck_limit = v;
        }
        if let Some(secs) = env_parse("MANUS_STREAM_TIMEOUT_SECS")? {
            config.stream_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(AgentError::Config("max_steps must be at least 1".into()));
        }
        if self.duplicate_threshold < 2 {
            return Err(AgentError::Config(
                "duplicate_threshold must be at least 2".into(),
            ));
        }
        if self.stuck_limit == 0 {
            return Err(AgentError::Config("stuck_limit must be at least 1".into()));
        }
        if self.stream_timeout.is_zero() {
            return Err(AgentError::Config("stream_timeout must be non-zero".into()));
        }
        if self.event_buffer == 0 {
            return Err(AgentError::Config("event_buffer must be at least 1".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.next_step_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    #[must_use]
    pub const fn max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    /// Sets both the duplicate-run length and the stuck limit.
    #[must_use]
    pub const fn duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold;
        self.stuck_limit = threshold;
        self
    }

    #[must_use]
    pub const fn check_range(mut self, range: usize) -> Self {
        self.check_range = range;
        self
    }

    #[must_use]
    pub const fn stuck_limit(mut self, limit: usize) -> Self {
        self.stuck_limit = limit;
        self
    }

    #[must_use]
    pub const fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
