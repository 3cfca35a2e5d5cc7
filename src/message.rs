//! Conversation data model
//!
//! Messages are serialised in the backend's message schema, so the full
//! history can be posted as-is on every turn.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shown when a request fails for any reason.
pub const ERROR_TEXT: &str = "Sorry, there was an error processing your request.";

/// First assistant message of every conversation.
pub const GREETING_TEXT: &str = "Olá, em que posso ajudá-lo?";

/// The sender of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ai")]
    Assistant,
    #[serde(rename = "human")]
    Human,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub additional_kwargs: Map<String, Value>,
    #[serde(default)]
    pub example: bool,
    #[serde(rename = "isMarkdown", default)]
    pub is_markdown: bool,
    /// Link to an interactive 3D rendition of the artwork being discussed.
    #[serde(rename = "URL3D", default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, is_markdown: bool) -> Self {
        Self {
            role,
            content: content.into(),
            additional_kwargs: Map::new(),
            example: false,
            is_markdown,
            resource_url: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content, false)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, false)
    }

    /// Empty markdown reply that stream updates are written into.
    pub fn streaming() -> Self {
        Self::new(Role::Assistant, String::new(), true)
    }

    pub fn greeting() -> Self {
        Self::assistant(GREETING_TEXT)
    }

    pub fn error() -> Self {
        Self::assistant(ERROR_TEXT)
    }
}

/// Ordered chat history.
///
/// Entries are only ever appended. At most one entry, always the last one,
/// is "in progress" and may be rewritten in place while a reply streams in.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
    in_progress: Option<usize>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::from_messages(vec![Message::greeting()])
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            in_progress: None,
        }
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

    /// Appends a finished message, closing any reply still in progress.
    pub fn push(&mut self, message: Message) {
        self.in_progress = None;
        self.messages.push(message);
    }

    /// Appends an empty assistant reply and marks it in progress.
    pub fn begin_reply(&mut self) {
        self.messages.push(Message::streaming());
        self.in_progress = Some(self.messages.len() - 1);
    }

    pub fn is_replying(&self) -> bool {
        self.in_progress.is_some()
    }

    pub fn in_progress(&self) -> Option<&Message> {
        self.in_progress.and_then(|i| self.messages.get(i))
    }

    pub fn in_progress_mut(&mut self) -> Option<&mut Message> {
        match self.in_progress {
            Some(i) => self.messages.get_mut(i),
            None => None,
        }
    }

    pub fn finish_reply(&mut self) {
        self.in_progress = None;
    }

    /// Drops the in-progress reply if nothing was written into it yet.
    /// A reply with content or a resource link is kept and closed instead.
    pub fn abandon_reply(&mut self) {
        if let Some(i) = self.in_progress.take() {
            let untouched = self
                .messages
                .get(i)
                .map(|m| m.content.is_empty() && m.resource_url.is_none())
                .unwrap_or(false);
            if untouched && i + 1 == self.messages.len() {
                self.messages.pop();
            }
        }
    }

    /// Indices of messages that carry a 3D resource link, oldest first.
    pub fn resource_indices(&self) -> Vec<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.resource_url.is_some())
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_starts_with_greeting() {
        let conv = Conversation::new();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::Assistant);
        assert_eq!(conv.messages()[0].content, GREETING_TEXT);
        assert!(!conv.is_replying());
    }

    #[test]
    fn test_wire_format_matches_backend_schema() {
        let msg = Message::human("Quem pintou a Vênus?");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "human");
        assert_eq!(json["content"], "Quem pintou a Vênus?");
        assert_eq!(json["additional_kwargs"], serde_json::json!({}));
        assert_eq!(json["example"], false);
        assert_eq!(json["isMarkdown"], false);
        assert!(json.get("URL3D").is_none());

        let mut reply = Message::streaming();
        reply.resource_url = Some("https://example.org/venus".to_string());
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "ai");
        assert_eq!(json["isMarkdown"], true);
        assert_eq!(json["URL3D"], "https://example.org/venus");
    }

    #[test]
    fn test_deserialize_tolerates_missing_optional_fields() {
        let msg: Message = serde_json::from_str(r#"{"type":"ai","content":"oi"}"#).unwrap();
        assert_eq!(msg, Message::assistant("oi"));
    }

    #[test]
    fn test_only_last_message_is_mutated() {
        let mut conv = Conversation::new();
        conv.push(Message::human("olá"));
        conv.begin_reply();
        conv.in_progress_mut().unwrap().content.push_str("Hel");
        conv.in_progress_mut().unwrap().content.push_str("lo");

        assert_eq!(conv.messages()[0].content, GREETING_TEXT);
        assert_eq!(conv.messages()[1].content, "olá");
        assert_eq!(conv.last().unwrap().content, "Hello");
    }

    #[test]
    fn test_push_closes_reply_in_progress() {
        let mut conv = Conversation::new();
        conv.begin_reply();
        conv.push(Message::human("next"));
        assert!(!conv.is_replying());
        assert!(conv.in_progress_mut().is_none());
    }

    #[test]
    fn test_abandon_removes_empty_reply() {
        let mut conv = Conversation::new();
        conv.begin_reply();
        conv.abandon_reply();
        assert_eq!(conv.len(), 1);
        assert!(!conv.is_replying());
    }

    #[test]
    fn test_abandon_keeps_partial_reply() {
        let mut conv = Conversation::new();
        conv.begin_reply();
        conv.in_progress_mut().unwrap().content = "partial".to_string();
        conv.abandon_reply();
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last().unwrap().content, "partial");
        assert!(!conv.is_replying());
    }

    #[test]
    fn test_resource_indices() {
        let mut conv = Conversation::new();
        conv.push(Message::human("a"));
        let mut with_url = Message::assistant("b");
        with_url.resource_url = Some("https://x".to_string());
        conv.push(with_url);
        assert_eq!(conv.resource_indices(), vec![2]);
    }
}
