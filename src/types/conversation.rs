//! Conversation model
//!
//! - Item = one role's contribution, immutable once appended
//! - Log = ordered, append-only sequence of items (chronological turn order)

use serde::{Deserialize, Serialize};

/// Who produced a conversation item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single completed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub role: Role,
    pub content: String,
}

impl ConversationItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only conversation log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    items: Vec<ConversationItem>,
}

impl ConversationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed item
    pub fn push(&mut self, item: ConversationItem) {
        self.items.push(item);
    }

    /// The log as it would be sent with one more user prompt.
    /// The log itself is left untouched until the turn completes.
    pub fn with_prompt(&self, prompt: &str) -> Vec<ConversationItem> {
        let mut pending = self.items.clone();
        pending.push(ConversationItem::user(prompt));
        pending
    }

    /// All items, oldest first
    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Forget the whole conversation
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_prompt_leaves_log_untouched() {
        let mut log = ConversationLog::new();
        log.push(ConversationItem::user("hi"));
        log.push(ConversationItem::assistant("hello"));

        let pending = log.with_prompt("again");
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[2], ConversationItem::user("again"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ConversationItem::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }

    #[test]
    fn test_log_serializes_as_plain_array() {
        let mut log = ConversationLog::new();
        log.push(ConversationItem::user("a"));
        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(json, r#"[{"role":"user","content":"a"}]"#);
    }

    #[test]
    fn test_clear() {
        let mut log = ConversationLog::new();
        log.push(ConversationItem::user("a"));
        log.clear();
        assert!(log.is_empty());
    }
}
