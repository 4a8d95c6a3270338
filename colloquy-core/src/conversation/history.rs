//! Conversation History
//!
//! Ordered message list holding at most one system message, always first.

use crate::llm::{Message, MessageRole};
use crate::tokens::TokenCounter;

/// Ordered message history for a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history holding only a system message
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Build from an arbitrary message list, restoring the system-message invariant.
    ///
    /// A leading system message is kept; any later system messages are dropped.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut normalized = Vec::with_capacity(messages.len());
        for (index, message) in messages.into_iter().enumerate() {
            if message.is_system() && index > 0 {
                continue;
            }
            normalized.push(message);
        }
        Self {
            messages: normalized,
        }
    }

    /// Point the system message at `prompt`, inserting one at index 0 if absent.
    ///
    /// Idempotent: a second call with the same prompt changes nothing.
    pub fn sync_system_message(&mut self, prompt: &str) {
        match self.messages.first_mut() {
            Some(first) if first.is_system() => {
                if first.content != prompt {
                    first.content = prompt.to_string();
                }
            }
            _ => self.messages.insert(0, Message::system(prompt)),
        }
    }

    /// Append a user or assistant turn.
    ///
    /// System messages are routed through [`sync_system_message`](Self::sync_system_message)
    /// so the invariant cannot be broken by appending.
    pub fn push(&mut self, message: Message) {
        if message.role == MessageRole::System {
            self.sync_system_message(&message.content);
        } else {
            self.messages.push(message);
        }
    }

    /// Remove the oldest entry after index 0.
    ///
    /// Returns `None` once only one entry remains.
    pub fn evict_oldest_turn(&mut self) -> Option<Message> {
        if self.messages.len() <= 1 {
            return None;
        }
        Some(self.messages.remove(1))
    }

    /// The system message, if present
    pub fn system_message(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.is_system())
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// User and assistant turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }

    /// Last message, if any
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Sum of the token counts of every message's content
    pub fn total_tokens(&self, counter: &dyn TokenCounter, model: &str) -> usize {
        self.messages
            .iter()
            .map(|m| counter.count(model, &m.content))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::HeuristicTokenCounter;

    fn system_count(history: &ConversationHistory) -> usize {
        history.messages().iter().filter(|m| m.is_system()).count()
    }

    #[test]
    fn test_with_system() {
        let history = ConversationHistory::with_system("Be sassy");
        assert_eq!(history.len(), 1);
        assert_eq!(history.system_message().unwrap().content, "Be sassy");
    }

    #[test]
    fn test_sync_replaces_existing_system() {
        let mut history = ConversationHistory::with_system("old");
        history.push(Message::user("hi"));

        history.sync_system_message("new");
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0], Message::system("new"));
        assert_eq!(history.messages()[1], Message::user("hi"));
    }

    #[test]
    fn test_sync_inserts_when_missing() {
        let mut history = ConversationHistory::new();
        history.push(Message::user("hi"));

        history.sync_system_message("prompt");
        assert_eq!(history.len(), 2);
        assert!(history.messages()[0].is_system());
        assert_eq!(history.messages()[1], Message::user("hi"));
    }

    #[test]
    fn test_sync_idempotent() {
        let mut once = ConversationHistory::new();
        once.push(Message::user("hi"));
        once.sync_system_message("prompt");

        let mut twice = once.clone();
        twice.sync_system_message("prompt");

        assert_eq!(once, twice);
    }

    #[test]
    fn test_push_system_keeps_single_system() {
        let mut history = ConversationHistory::with_system("a");
        history.push(Message::user("hi"));
        history.push(Message::system("b"));

        assert_eq!(system_count(&history), 1);
        assert_eq!(history.messages()[0].content, "b");
        assert_eq!(history.last(), Some(&Message::user("hi")));
    }

    #[test]
    fn test_evict_oldest_turn() {
        let mut history = ConversationHistory::with_system("s");
        history.push(Message::user("first"));
        history.push(Message::assistant("second"));

        assert_eq!(history.evict_oldest_turn(), Some(Message::user("first")));
        assert_eq!(history.evict_oldest_turn(), Some(Message::assistant("second")));
        assert_eq!(history.evict_oldest_turn(), None);
        assert_eq!(history.messages(), &[Message::system("s")]);
    }

    #[test]
    fn test_from_messages_normalizes() {
        let history = ConversationHistory::from_messages(vec![
            Message::system("keep"),
            Message::user("hi"),
            Message::system("drop"),
            Message::assistant("hello"),
        ]);

        assert_eq!(system_count(&history), 1);
        assert_eq!(history.len(), 3);
        assert_eq!(history.turns().count(), 2);
    }

    #[test]
    fn test_total_tokens_counts_content_only() {
        let counter = HeuristicTokenCounter::default();
        let mut history = ConversationHistory::with_system("abcd");
        history.push(Message::user("abcdefgh"));

        assert_eq!(history.total_tokens(&counter, "any"), 3);
    }
}
