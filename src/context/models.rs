//! Data models for the conversation log

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered message history, oldest first.
///
/// At most one message has the `system` role and, when present, it sits at
/// index 0. Mutators on this type keep that invariant; the serialized form is
/// a plain JSON array of `{role, content}` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// A log holding only the given system prompt
    pub fn seeded(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Build a log from raw messages, rejecting anything that breaks the
    /// system-at-index-0 invariant.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, String> {
        let misplaced = messages
            .iter()
            .skip(1)
            .position(|m| m.role == Role::System);
        if let Some(idx) = misplaced {
            return Err(format!("system message found at index {}", idx + 1));
        }
        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Replace the system message at index 0, inserting one if absent.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => first.content = text,
            _ => self.messages.insert(0, Message::system(text)),
        }
    }

    /// Append a user or assistant message. A system message replaces the one
    /// at index 0 rather than being appended.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            self.set_system_prompt(message.content);
            return;
        }
        self.messages.push(message);
    }

    /// Remove the oldest message after index 0.
    pub fn evict_oldest(&mut self) -> Option<Message> {
        if self.messages.len() > 1 {
            Some(self.messages.remove(1))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_system_prompt_replaces_in_place() {
        let mut log = ConversationLog::seeded("first");
        log.push(Message::user("hi"));
        log.set_system_prompt("second");
        assert_eq!(log.len(), 2);
        assert_eq!(log.system_prompt(), Some("second"));
        assert_eq!(log.messages()[1], Message::user("hi"));
    }

    #[test]
    fn test_set_system_prompt_inserts_when_missing() {
        let mut log = ConversationLog::from_messages(vec![Message::user("hi")]).unwrap();
        log.set_system_prompt("persona");
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0], Message::system("persona"));
    }

    #[test]
    fn test_from_messages_rejects_misplaced_system() {
        let result = ConversationLog::from_messages(vec![
            Message::system("a"),
            Message::user("b"),
            Message::system("c"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_evict_oldest_keeps_index_zero() {
        let mut log = ConversationLog::seeded("sys");
        log.push(Message::user("one"));
        log.push(Message::assistant("two"));

        assert_eq!(log.evict_oldest(), Some(Message::user("one")));
        assert_eq!(log.evict_oldest(), Some(Message::assistant("two")));
        assert_eq!(log.evict_oldest(), None);
        assert_eq!(log.messages(), &[Message::system("sys")]);
    }

    #[test]
    fn test_serialized_shape() {
        let log = ConversationLog::seeded("sys");
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json, serde_json::json!([{"role": "system", "content": "sys"}]));
    }
}
