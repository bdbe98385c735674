//! Conversation history management
//!
//! Maintains chat history with a configurable length limit.

use std::collections::VecDeque;

use crate::core::{Message, Role};

/// Ordered chat history shared by the supervisor and the workers
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: VecDeque<Message>,
    /// Maximum history length
    max_length: usize,
}

impl Conversation {
    pub fn new(max_length: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_length: max_length.max(1),
        }
    }

    /// Rebuild from stored messages, keeping the most recent ones
    pub fn from_messages(messages: Vec<Message>, max_length: usize) -> Self {
        let mut conv = Self::new(max_length);
        conv.replace(messages);
        conv
    }

    /// Add a message and maintain the size limit
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);

        while self.messages.len() > self.max_length {
            self.messages.pop_front();
        }
    }

    /// Replace the whole history
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        for message in messages {
            self.push(message);
        }
    }

    /// Snapshot of the history, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_basic() {
        let mut conv = Conversation::new(10);
        conv.push(Message::user("I just crashed"));
        conv.push(Message::assistant("Are you hurt?"));

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last_user_message().unwrap().content, "I just crashed");
    }

    #[test]
    fn test_conversation_limit() {
        let mut conv = Conversation::new(3);
        conv.push(Message::user("1"));
        conv.push(Message::assistant("2"));
        conv.push(Message::user("3"));
        conv.push(Message::assistant("4"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[0].content, "2");
    }

    #[test]
    fn test_replace_keeps_most_recent() {
        let history = (0..5).map(|i| Message::user(i.to_string())).collect();
        let conv = Conversation::from_messages(history, 2);

        let contents: Vec<_> = conv.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["3", "4"]);
    }
}
