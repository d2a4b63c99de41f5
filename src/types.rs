//! Shared request and message types
//!
//! Core shapes exchanged between the completion engine and its callers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single conversation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Persona identity injected into the system prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaContext {
    /// Display name of the digital clone
    pub name: String,

    /// Free-form persona description (tone, background, style)
    #[serde(default)]
    pub description: String,

    /// Owner of the persona's knowledge base
    pub user_id: String,

    /// Optional application scope for source queries
    #[serde(default)]
    pub app_id: Option<String>,
}

/// Inbound completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation history, oldest first; last entry is the active user query
    pub messages: Vec<Message>,

    /// Models to run concurrently for this prompt
    pub models: Vec<String>,

    /// Existing conversation, or None for a brand-new one
    #[serde(default)]
    pub conversation_id: Option<Uuid>,

    /// Extended step budget mode
    #[serde(default)]
    pub deep_mode: bool,

    pub persona: PersonaContext,
}

impl CompletionRequest {
    /// The active user query (content of the last user message)
    pub fn latest_query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Knowledge source kinds known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Memory,
    Content,
    WebSearch,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Memory => "memory",
            SourceKind::Content => "content",
            SourceKind::WebSearch => "web_search",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_query_finds_last_user_message() {
        let request = CompletionRequest {
            messages: vec![
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ],
            models: vec!["default".to_string()],
            conversation_id: None,
            deep_mode: false,
            persona: PersonaContext::default(),
        };

        assert_eq!(request.latest_query(), Some("second"));
    }

    #[test]
    fn test_latest_query_empty_messages() {
        let request = CompletionRequest {
            messages: vec![],
            models: vec![],
            conversation_id: None,
            deep_mode: false,
            persona: PersonaContext::default(),
        };

        assert!(request.latest_query().is_none());
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Memory.to_string(), "memory");
        assert_eq!(SourceKind::WebSearch.to_string(), "web_search");
    }

    #[test]
    fn test_message_serialization_roles() {
        let msg = Message::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"user\""));
    }
}
