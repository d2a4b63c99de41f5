//! Conversation-scoped web-search cache and query history
//!
//! Two pieces of purely in-memory bookkeeping, both keyed by conversation id:
//! a TTL-bound cache of expensive web-search results, and a bounded list of
//! recent queries injected into the generation prompt so the model does not
//! repeat identical searches. A miss is never an error.
//!
//! Mutations happen in short lock-held sections at task suspension
//! boundaries; a multi-instance deployment gets independent per-process
//! caches, which is a scaling caveat rather than a correctness issue.

use crate::config::CacheConfig;
use crate::retrieval::RetrievalResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Default entry lifetime (15 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

/// Default bounded history length
pub const DEFAULT_HISTORY_MAX: usize = 10;

/// One recorded search in a conversation's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHistoryEntry {
    /// Normalized form used for dedup
    pub normalized: String,
    /// Raw display string, suffixed with "(cached)" for cache hits
    pub display: String,
}

#[derive(Debug)]
struct CacheEntry {
    timestamp: Instant,
    results: Vec<RetrievalResult>,
}

#[derive(Debug, Default)]
struct ConversationEntry {
    cached: HashMap<String, CacheEntry>,
    history: Vec<QueryHistoryEntry>,
}

impl ConversationEntry {
    fn is_empty(&self) -> bool {
        self.cached.is_empty() && self.history.is_empty()
    }
}

/// TTL cache plus bounded query history, keyed by conversation id
pub struct ConversationCache {
    ttl: Duration,
    history_max: usize,
    inner: Mutex<HashMap<Uuid, ConversationEntry>>,
    /// Test hook: virtual clock skew in milliseconds
    skew_ms: AtomicU64,
}

impl Default for ConversationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_HISTORY_MAX)
    }
}

impl ConversationCache {
    pub fn new(ttl: Duration, history_max: usize) -> Self {
        Self {
            ttl,
            history_max,
            inner: Mutex::new(HashMap::new()),
            skew_ms: AtomicU64::new(0),
        }
    }

    /// Build from the engine's cache settings
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.query_history_max)
    }

    /// Normalize a query: trim, collapse internal whitespace, lowercase
    pub fn normalize(query: &str) -> String {
        query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    fn now(&self) -> Instant {
        Instant::now() + Duration::from_millis(self.skew_ms.load(Ordering::Relaxed))
    }

    /// Advance the cache's view of time (tests only)
    #[cfg(test)]
    pub fn advance(&self, by: Duration) {
        self.skew_ms
            .fetch_add(by.as_millis() as u64, Ordering::Relaxed);
    }

    /// Look up a cached search result, evicting it if stale.
    pub fn get_cached(&self, conversation_id: Uuid, query: &str) -> Option<Vec<RetrievalResult>> {
        let normalized = Self::normalize(query);
        let now = self.now();

        let mut map = self.inner.lock().expect("cache lock poisoned");
        let entry = map.get_mut(&conversation_id)?;

        match entry.cached.get(&normalized) {
            Some(cached) if now.duration_since(cached.timestamp) <= self.ttl => {
                Some(cached.results.clone())
            }
            Some(_) => {
                debug!(%conversation_id, query = %normalized, "evicting stale cache entry");
                entry.cached.remove(&normalized);
                if entry.is_empty() {
                    map.remove(&conversation_id);
                }
                None
            }
            None => None,
        }
    }

    /// Upsert a search result, resetting its timestamp.
    pub fn set_cached(&self, conversation_id: Uuid, query: &str, results: Vec<RetrievalResult>) {
        let normalized = Self::normalize(query);
        let timestamp = self.now();

        let mut map = self.inner.lock().expect("cache lock poisoned");
        map.entry(conversation_id)
            .or_default()
            .cached
            .insert(normalized, CacheEntry { timestamp, results });
    }

    /// Append a query to the bounded history. Re-recording an existing query
    /// moves it to the tail instead of duplicating it.
    pub fn record_query(&self, conversation_id: Uuid, query: &str, was_cached: bool) {
        let normalized = Self::normalize(query);
        let display = if was_cached {
            format!("{} (cached)", query.trim())
        } else {
            query.trim().to_string()
        };

        let mut map = self.inner.lock().expect("cache lock poisoned");
        let history = &mut map.entry(conversation_id).or_default().history;

        history.retain(|entry| entry.normalized != normalized);
        history.push(QueryHistoryEntry {
            normalized,
            display,
        });

        while history.len() > self.history_max {
            history.remove(0);
        }
    }

    /// Display strings of recent queries, oldest first
    pub fn recent_queries(&self, conversation_id: Uuid) -> Vec<String> {
        let map = self.inner.lock().expect("cache lock poisoned");
        map.get(&conversation_id)
            .map(|entry| entry.history.iter().map(|e| e.display.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of conversations currently tracked
    pub fn conversation_count(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }
}
