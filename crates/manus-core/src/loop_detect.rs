//! Stuck Detection
//!
//! A run is considered stuck when the assistant keeps saying the same thing:
//! among the last `check_range` messages, some `duplicate_threshold`
//! consecutive assistant texts are identical.

use crate::message::Conversation;

pub fn is_stuck(conversation: &Conversation, duplicate_threshold: usize, check_range: usize) -> bool {
    if conversation.len() < 2 || duplicate_threshold == 0 {
        return false;
    }

    conversation
        .recent_assistant_texts(check_range)
        .windows(duplicate_threshold)
        .any(|run| run.iter().all(|text| *text == run[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn conversation(texts: &[&str]) -> Conversation {
        let mut conv = Conversation::new();
        conv.push(Message::user("task"));
        for text in texts {
            conv.push(Message::assistant(*text));
        }
        conv
    }

    #[test]
    fn test_identical_run_detected() {
        let conv = conversation(&["a", "same", "same", "same", "same"]);
        assert!(is_stuck(&conv, 4, 6));
    }

    #[test]
    fn test_run_shorter_than_threshold() {
        let conv = conversation(&["same", "same", "same"]);
        assert!(!is_stuck(&conv, 4, 6));
    }

    #[test]
    fn test_run_must_be_contiguous() {
        let conv = conversation(&["same", "same", "other", "same", "same"]);
        assert!(!is_stuck(&conv, 4, 6));
    }

    #[test]
    fn test_window_limits_lookback() {
        // Four duplicates exist, but only the last three fall inside a range of 3.
        let conv = conversation(&["same", "same", "same", "same"]);
        assert!(!is_stuck(&conv, 4, 3));
        assert!(is_stuck(&conv, 4, 4));
    }

    #[test]
    fn test_only_assistant_text_counts() {
        let mut conv = Conversation::new();
        for _ in 0..3 {
            conv.push(Message::assistant("same"));
            conv.push(Message::tool("search", "same", None));
        }
        // Window of 6 holds three assistant texts: below a threshold of 4.
        assert!(!is_stuck(&conv, 4, 6));
        assert!(is_stuck(&conv, 3, 6));
    }

    #[test]
    fn test_short_conversation_never_stuck() {
        let mut conv = Conversation::new();
        conv.push(Message::assistant("same"));
        assert!(!is_stuck(&conv, 1, 6));
    }
}
