//! Persistence and error-reporting collaborators
//!
//! Both are best-effort from the engine's point of view: a persistence
//! failure is logged and never retracts what was already streamed, and the
//! reporter is fire-and-forget. `save_message` must be duplicate-safe by
//! message id so a retry cannot double-write.

use crate::errors::EngineError;
use crate::tools::{Reference, ToolExecutionRecord};
use crate::types::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    /// Model that produced the message, for assistant messages
    pub model: Option<String>,
    pub references: Vec<Reference>,
    /// Tool executions that contributed to this message
    #[serde(default)]
    pub tool_log: Vec<ToolExecutionRecord>,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(conversation_id: Uuid, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.into(),
            model: None,
            references: Vec::new(),
            tool_log: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Relational persistence collaborator
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn save_conversation(&self, record: ConversationRecord) -> anyhow::Result<()>;

    /// Must be idempotent per `record.id`
    async fn save_message(&self, record: MessageRecord) -> anyhow::Result<()>;
}

/// External error-tracking collaborator
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &EngineError, context: &str);
}

/// Reporter that only logs locally
#[derive(Debug, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, err: &EngineError, context: &str) {
        error!(context, error = %err, "engine error reported");
    }
}

/// In-memory store used by tests and single-process deployments
#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: Mutex<HashMap<Uuid, ConversationRecord>>,
    messages: Mutex<HashMap<Uuid, MessageRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self, id: Uuid) -> Option<ConversationRecord> {
        self.conversations
            .lock()
            .expect("store lock poisoned")
            .get(&id)
            .cloned()
    }

    /// Messages for a conversation, oldest first
    pub fn messages_for(&self, conversation_id: Uuid) -> Vec<MessageRecord> {
        let mut messages: Vec<MessageRecord> = self
            .messages
            .lock()
            .expect("store lock poisoned")
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().expect("store lock poisoned").len()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn save_conversation(&self, record: ConversationRecord) -> anyhow::Result<()> {
        self.conversations
            .lock()
            .expect("store lock poisoned")
            .insert(record.id, record);
        Ok(())
    }

    async fn save_message(&self, record: MessageRecord) -> anyhow::Result<()> {
        // Re-check by unique id keeps retries from double-writing
        self.messages
            .lock()
            .expect("store lock poisoned")
            .entry(record.id)
            .or_insert(record);
        Ok(())
    }
}
