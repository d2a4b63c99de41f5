//! Per-conversation caching and query history

pub mod conversation;

pub use conversation::{ConversationCache, QueryHistoryEntry};
