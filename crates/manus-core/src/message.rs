//! Conversation Messages
//!
//! Role-tagged messages exchanged between the driver, the active step and the
//! reasoning engine. The role tag drives loop detection (assistant text only)
//! and termination detection (tool results only), so every consumer matches
//! on the variant exhaustively.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCallRequest;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        text: String,
    },
    User {
        text: String,
    },
    Assistant {
        text: String,
        /// Calls proposed alongside the text, in the order they must run
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_name: String,
        result_data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
}

impl Message {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    /// Create an assistant message without tool calls
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message carrying tool calls
    pub fn assistant_with_calls(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls,
        }
    }

    /// Create a tool result message
    pub fn tool(
        tool_name: impl Into<String>,
        result_data: impl Into<String>,
        call_id: Option<String>,
    ) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            result_data: result_data.into(),
            call_id,
        }
    }

    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Primary text payload (result data for tool messages)
    pub fn text(&self) -> &str {
        match self {
            Self::System { text } | Self::User { text } | Self::Assistant { text, .. } => text,
            Self::Tool { result_data, .. } => result_data,
        }
    }

    /// Assistant text, `None` for every other role
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            Self::Assistant { text, .. } => Some(text),
            Self::System { .. } | Self::User { .. } | Self::Tool { .. } => None,
        }
    }
}

/// Ordered conversation buffer owned by one agent run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Swap in a conversation returned by a collaborator
    pub fn replace(&mut self, other: Self) {
        self.messages = other.messages;
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Texts of the assistant messages among the last `range` messages, oldest first.
    pub fn recent_assistant_texts(&self, range: usize) -> Vec<&str> {
        let start = self.messages.len().saturating_sub(range);
        self.messages[start..]
            .iter()
            .filter_map(Message::assistant_text)
            .collect()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.text(), "Hello");
        assert_eq!(msg.assistant_text(), None);

        let tool = Message::tool("search", "3 hits", Some("call-1".into()));
        assert_eq!(tool.role(), Role::Tool);
        assert_eq!(tool.text(), "3 hits");
    }

    #[test]
    fn test_recent_assistant_texts() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Hi"));
        conv.push(Message::assistant("a"));
        conv.push(Message::tool("t", "r", None));
        conv.push(Message::assistant("b"));
        conv.push(Message::assistant("c"));

        assert_eq!(conv.recent_assistant_texts(3), vec!["b", "c"]);
        assert_eq!(conv.recent_assistant_texts(100), vec!["a", "b", "c"]);
        assert!(conv.recent_assistant_texts(0).is_empty());
    }

    #[test]
    fn test_role_tag_serialization() {
        let msg = Message::tool("terminate", "done", None);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_name"], "terminate");
        assert!(json.get("call_id").is_none());

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
