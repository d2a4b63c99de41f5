//! Tool executor
//!
//! Runs retrieval-backed tool calls issued by the model. Each tool targets
//! one source retriever and reuses the merger for sorting, dedup, and
//! confidence classification. Any failure (unknown tool, bad arguments, a
//! source outage) comes back as a structured `success: false` output for the
//! model, never as an error.

use crate::query::QueryAnalyzer;
use crate::retrieval::{ResultMerger, RetrievalRequest, SourceRetriever};
use crate::tools::registry::max_results_cap;
use crate::tools::types::{Reference, ToolCall, ToolOutput};
use crate::types::SourceKind;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Per-request context threaded into every tool execution
#[derive(Debug, Clone)]
pub struct ToolInvocationContext {
    pub user_id: String,
    pub app_id: Option<String>,
    pub conversation_id: Option<Uuid>,
    /// Default result budget when the model does not specify one
    pub max_results: usize,
}

/// Executes tool calls against their backing source retrievers
pub struct ToolExecutor {
    analyzer: QueryAnalyzer,
    merger: ResultMerger,
    /// Source retriever per tool name
    sources: HashMap<&'static str, Arc<dyn SourceRetriever>>,
}

impl ToolExecutor {
    /// Wire each retriever to its tool name by source kind.
    pub fn new(retrievers: &[Arc<dyn SourceRetriever>]) -> Self {
        let mut sources: HashMap<&'static str, Arc<dyn SourceRetriever>> = HashMap::new();
        for retriever in retrievers {
            let tool = match retriever.name() {
                name if name == SourceKind::Memory.as_str() => "search_memory",
                name if name == SourceKind::Content.as_str() => "search_content",
                name if name == SourceKind::WebSearch.as_str() => "web_search",
                _ => continue,
            };
            sources.insert(tool, Arc::clone(retriever));
        }

        Self {
            analyzer: QueryAnalyzer::new(),
            merger: ResultMerger::new(),
            sources,
        }
    }

    /// Execute one tool call.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolInvocationContext) -> ToolOutput {
        let started = Instant::now();

        let retriever = match self.sources.get(call.name.as_str()) {
            Some(retriever) => retriever,
            None => {
                return ToolOutput::failure(
                    call,
                    format!("Unknown tool: {}", call.name),
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let query = match call.arguments.get("query").and_then(|v| v.as_str()) {
            Some(query) if !query.trim().is_empty() => query.to_string(),
            _ => {
                return ToolOutput::failure(
                    call,
                    "Missing required argument: query",
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let max_results = call
            .arguments
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(ctx.max_results)
            .clamp(1, max_results_cap(&call.name));

        let mut request = RetrievalRequest::new(&query, &ctx.user_id, max_results);
        request.app_id = ctx.app_id.clone();
        request.conversation_id = ctx.conversation_id;

        let analysis = self.analyzer.analyze(&query);
        let results = retriever.retrieve(&request, &analysis).await;
        let response = self.merger.merge(vec![results], &query, max_results);

        debug!(
            tool = %call.name,
            query = %query,
            total = response.total_results,
            "tool execution complete"
        );

        let references: Vec<Reference> = response.results.iter().map(Reference::from).collect();

        let payload = serde_json::json!({
            "query": response.query,
            "total_results": response.total_results,
            "confidence": response.confidence,
            "results": response.results.iter().map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "content": r.content,
                    "relevance_score": r.relevance_score,
                    "source": r.source,
                })
            }).collect::<Vec<_>>(),
        });

        ToolOutput::success(call, payload, references, started.elapsed().as_millis() as u64)
    }

    /// Tool names with a wired source
    pub fn available_tools(&self) -> Vec<&'static str> {
        self.sources.keys().copied().collect()
    }
}
