//! Source retrievers
//!
//! Each retriever wraps one external knowledge source behind the uniform
//! `SourceRetriever` contract. Retrievers never propagate failures: a source
//! outage is logged and yields an empty result list so the merge degrades
//! gracefully instead of failing the whole retrieval.

use crate::cache::ConversationCache;
use crate::query::QueryAnalysis;
use crate::retrieval::{clamp_score, RetrievalRequest, RetrievalResult};
use crate::types::SourceKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw hit from the personal memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchResult {
    pub id: String,
    pub memory: String,
    pub score: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<MemorySearchResult> for RetrievalResult {
    fn from(result: MemorySearchResult) -> Self {
        Self {
            id: result.id,
            content: result.memory,
            relevance_score: clamp_score(result.score),
            source: SourceKind::Memory.as_str().to_string(),
            result_type: result.categories.first().cloned(),
            created_at: result.created_at,
            metadata: serde_json::json!({ "categories": result.categories }),
        }
    }
}

/// Raw hit from the structured content store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSearchResult {
    pub id: String,
    pub title: String,
    pub text: String,
    pub score: f64,
    pub platform: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<ContentSearchResult> for RetrievalResult {
    fn from(result: ContentSearchResult) -> Self {
        let content = if result.title.is_empty() {
            result.text.clone()
        } else {
            format!("{}\n{}", result.title, result.text)
        };

        Self {
            id: result.id,
            content,
            relevance_score: clamp_score(result.score),
            source: SourceKind::Content.as_str().to_string(),
            result_type: Some(result.platform.clone()),
            created_at: result.published_at,
            metadata: serde_json::json!({
                "platform": result.platform,
                "url": result.url,
                "title": result.title,
            }),
        }
    }
}

/// Single live web-search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

impl From<WebSearchHit> for RetrievalResult {
    fn from(hit: WebSearchHit) -> Self {
        Self {
            // URL doubles as the stable identity for web results
            id: hit.url.clone(),
            content: format!("{}\n{}", hit.title, hit.snippet),
            relevance_score: clamp_score(hit.score),
            source: SourceKind::WebSearch.as_str().to_string(),
            result_type: Some("web_page".to_string()),
            created_at: None,
            metadata: serde_json::json!({ "url": hit.url, "title": hit.title }),
        }
    }
}

/// Personal memory store collaborator
#[async_trait]
pub trait MemorySearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        app_id: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<MemorySearchResult>>;
}

/// Structured content store collaborator
#[async_trait]
pub trait ContentSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        app_id: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<ContentSearchResult>>;
}

/// Live web-search collaborator
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<WebSearchHit>>;
}

/// Uniform retrieval contract over one knowledge source.
///
/// Infallible by design: implementations log failures and return an empty
/// list, isolating source outages from the rest of the pipeline.
#[async_trait]
pub trait SourceRetriever: Send + Sync {
    /// Stable source name, also used in `sources_used`
    fn name(&self) -> &'static str;

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        analysis: &QueryAnalysis,
    ) -> Vec<RetrievalResult>;
}

/// Retriever over the personal memory store
pub struct MemoryRetriever {
    backend: Arc<dyn MemorySearch>,
}

impl MemoryRetriever {
    pub fn new(backend: Arc<dyn MemorySearch>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SourceRetriever for MemoryRetriever {
    fn name(&self) -> &'static str {
        SourceKind::Memory.as_str()
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        _analysis: &QueryAnalysis,
    ) -> Vec<RetrievalResult> {
        match self
            .backend
            .search(
                &request.query,
                &request.user_id,
                request.app_id.as_deref(),
                request.max_results,
            )
            .await
        {
            Ok(results) => results.into_iter().map(RetrievalResult::from).collect(),
            Err(e) => {
                warn!(source = self.name(), error = %e, "source retrieval failed");
                Vec::new()
            }
        }
    }
}

/// Retriever over the structured content store
pub struct ContentRetriever {
    backend: Arc<dyn ContentSearch>,
}

impl ContentRetriever {
    pub fn new(backend: Arc<dyn ContentSearch>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SourceRetriever for ContentRetriever {
    fn name(&self) -> &'static str {
        SourceKind::Content.as_str()
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        _analysis: &QueryAnalysis,
    ) -> Vec<RetrievalResult> {
        match self
            .backend
            .search(
                &request.query,
                &request.user_id,
                request.app_id.as_deref(),
                request.max_results,
            )
            .await
        {
            Ok(results) => results.into_iter().map(RetrievalResult::from).collect(),
            Err(e) => {
                warn!(source = self.name(), error = %e, "source retrieval failed");
                Vec::new()
            }
        }
    }
}

/// Retriever over live web search, fronted by the conversation cache.
///
/// When the request carries a conversation id, the cache is consulted before
/// any live call and fresh responses are written back. Every served search is
/// recorded in the conversation's query history so the generation prompt can
/// tell the model not to repeat it.
pub struct WebSearchRetriever {
    backend: Arc<dyn WebSearch>,
    cache: Arc<ConversationCache>,
    timeout: Duration,
}

impl WebSearchRetriever {
    pub fn new(backend: Arc<dyn WebSearch>, cache: Arc<ConversationCache>) -> Self {
        Self {
            backend,
            cache,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn live_search(&self, request: &RetrievalRequest) -> Option<Vec<RetrievalResult>> {
        let call = self.backend.search(&request.query, request.max_results);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(hits)) => Some(hits.into_iter().map(RetrievalResult::from).collect()),
            Ok(Err(e)) => {
                warn!(source = self.name(), error = %e, "web search failed");
                None
            }
            Err(_) => {
                warn!(
                    source = self.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "web search timed out"
                );
                None
            }
        }
    }
}

#[async_trait]
impl SourceRetriever for WebSearchRetriever {
    fn name(&self) -> &'static str {
        SourceKind::WebSearch.as_str()
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        _analysis: &QueryAnalysis,
    ) -> Vec<RetrievalResult> {
        if let Some(conversation_id) = request.conversation_id {
            if let Some(cached) = self.cache.get_cached(conversation_id, &request.query) {
                debug!(query = %request.query, "web search served from cache");
                self.cache.record_query(conversation_id, &request.query, true);
                return cached;
            }

            let results = match self.live_search(request).await {
                Some(results) => results,
                None => return Vec::new(),
            };

            self.cache
                .set_cached(conversation_id, &request.query, results.clone());
            self.cache.record_query(conversation_id, &request.query, false);
            return results;
        }

        self.live_search(request).await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWeb;

    #[async_trait]
    impl WebSearch for FailingWeb {
        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<WebSearchHit>> {
            anyhow::bail!("backend down")
        }
    }

    struct StaticWeb {
        hits: Vec<WebSearchHit>,
    }

    #[async_trait]
    impl WebSearch for StaticWeb {
        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<WebSearchHit>> {
            Ok(self.hits.clone())
        }
    }

    fn hit(url: &str, score: f64) -> WebSearchHit {
        WebSearchHit {
            url: url.to_string(),
            title: "title".to_string(),
            snippet: "snippet".to_string(),
            score,
        }
    }

    #[test]
    fn test_memory_result_adaptation() {
        let raw = MemorySearchResult {
            id: "m1".to_string(),
            memory: "likes rust".to_string(),
            score: 1.4,
            categories: vec!["preferences".to_string()],
            created_at: None,
        };

        let result = RetrievalResult::from(raw);
        assert_eq!(result.source, "memory");
        assert_eq!(result.relevance_score, 1.0); // clamped
        assert_eq!(result.result_type.as_deref(), Some("preferences"));
    }

    #[test]
    fn test_content_result_adaptation() {
        let raw = ContentSearchResult {
            id: "c1".to_string(),
            title: "Post".to_string(),
            text: "body".to_string(),
            score: 0.8,
            platform: "blog".to_string(),
            url: None,
            published_at: None,
        };

        let result = RetrievalResult::from(raw);
        assert_eq!(result.source, "content");
        assert!(result.content.starts_with("Post"));
        assert_eq!(result.result_type.as_deref(), Some("blog"));
    }

    #[test]
    fn test_web_hit_identity_is_url() {
        let result = RetrievalResult::from(hit("https://example.com/a", 0.9));
        assert_eq!(result.id, "https://example.com/a");
        assert_eq!(result.source, "web_search");
    }

    #[tokio::test]
    async fn test_failing_web_source_returns_empty() {
        let cache = Arc::new(ConversationCache::default());
        let retriever = WebSearchRetriever::new(Arc::new(FailingWeb), cache);

        let request = RetrievalRequest::new("anything", "user-1", 5);
        let analysis = crate::query::QueryAnalyzer::new().analyze("anything");

        let results = retriever.retrieve(&request, &analysis).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_web_retriever_caches_per_conversation() {
        let cache = Arc::new(ConversationCache::default());
        let retriever = WebSearchRetriever::new(
            Arc::new(StaticWeb {
                hits: vec![hit("https://example.com/a", 0.9)],
            }),
            Arc::clone(&cache),
        );

        let conversation = uuid::Uuid::new_v4();
        let request = RetrievalRequest::new("latest ai news", "user-1", 5)
            .with_conversation(conversation);
        let analysis = crate::query::QueryAnalyzer::new().analyze("latest ai news");

        let first = retriever.retrieve(&request, &analysis).await;
        assert_eq!(first.len(), 1);

        // Second identical search is served from cache and marked in history
        let second = retriever.retrieve(&request, &analysis).await;
        assert_eq!(second.len(), 1);

        let history = cache.recent_queries(conversation);
        assert_eq!(history.len(), 1);
        assert!(history[0].ends_with("(cached)"));
    }
}
