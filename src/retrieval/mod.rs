//! Multi-source retrieval: unified result types, source retrievers,
//! deduplicating merger and the fan-out orchestrator.

pub mod merger;
pub mod orchestrator;
pub mod sources;

pub use merger::ResultMerger;
pub use orchestrator::RetrievalOrchestrator;
pub use sources::{
    ContentRetriever, ContentSearch, ContentSearchResult, MemoryRetriever, MemorySearch,
    MemorySearchResult, SourceRetriever, WebSearch, WebSearchHit, WebSearchRetriever,
};

use crate::query::SourceWeights;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single retrieval call; created per request, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default)]
    pub app_id: Option<String>,
    /// Conversation scope for cache consultation, if any
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub max_results: usize,
    /// Caller-supplied weight override; None defers to query analysis
    #[serde(default)]
    pub weights: Option<SourceWeights>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, user_id: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            app_id: None,
            conversation_id: None,
            max_results,
            weights: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Copy of this request with a per-source result budget
    pub(crate) fn with_max_results(&self, max_results: usize) -> Self {
        let mut request = self.clone();
        request.max_results = max_results;
        request
    }
}

/// Unified result shape every source adapts into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub content: String,
    /// Always within [0, 1]; clamped at adaptation time
    pub relevance_score: f64,
    pub source: String,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl RetrievalResult {
    /// Identity used for deduplication across the whole pipeline
    pub fn identity(&self) -> (String, String) {
        (self.id.clone(), self.source.clone())
    }
}

/// Coarse trust classification of a merged result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    None,
}

/// Merged, deduplicated, score-sorted retrieval output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub query: String,
    pub results: Vec<RetrievalResult>,
    pub total_results: usize,
    pub confidence: ConfidenceLevel,
    pub sources_used: Vec<String>,
    pub processing_time_ms: u64,
}

impl RetrievalResponse {
    /// Empty response for a query that matched nothing
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            total_results: 0,
            confidence: ConfidenceLevel::None,
            sources_used: Vec::new(),
            processing_time_ms: 0,
        }
    }
}

/// Clamp a raw score into the [0, 1] invariant range
pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
