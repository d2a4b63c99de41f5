//! Retrieval orchestration: analyze, fan out, merge
//!
//! Fans a query out to every registered source retriever concurrently, each
//! bounded by the per-source timeout, then merges the surviving result sets.
//! A source that fails or times out contributes an empty set; it never blocks
//! or fails the whole retrieval.

use crate::config::RetrievalConfig;
use crate::query::{QueryAnalyzer, SourceWeights};
use crate::retrieval::{ResultMerger, RetrievalRequest, RetrievalResponse, SourceRetriever};
use crate::types::SourceKind;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Coordinates the analyze → fan-out → merge pipeline
pub struct RetrievalOrchestrator {
    analyzer: QueryAnalyzer,
    merger: ResultMerger,
    retrievers: Vec<Arc<dyn SourceRetriever>>,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(retrievers: Vec<Arc<dyn SourceRetriever>>, config: RetrievalConfig) -> Self {
        Self {
            analyzer: QueryAnalyzer::new(),
            merger: ResultMerger::new(),
            retrievers,
            config,
        }
    }

    /// Run the full retrieval pipeline for one request.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalResponse {
        let started = Instant::now();

        let analysis = self.analyzer.analyze(&request.query);
        let weights = request.weights.unwrap_or(analysis.weights);

        let timeout = self.config.source_timeout();

        let calls = self.retrievers.iter().map(|retriever| {
            let budget = per_source_budget(retriever.name(), &weights, request.max_results);
            let scoped = request.with_max_results(budget);
            let analysis = analysis.clone();
            let retriever = Arc::clone(retriever);

            async move {
                match tokio::time::timeout(timeout, retriever.retrieve(&scoped, &analysis)).await {
                    Ok(results) => results,
                    Err(_) => {
                        warn!(
                            source = retriever.name(),
                            timeout_ms = timeout.as_millis() as u64,
                            "source retrieval timed out"
                        );
                        Vec::new()
                    }
                }
            }
        });

        let result_sets = join_all(calls).await;

        let mut response = self
            .merger
            .merge(result_sets, &request.query, request.max_results);
        response.processing_time_ms = started.elapsed().as_millis() as u64;

        debug!(
            query = %request.query,
            total = response.total_results,
            confidence = ?response.confidence,
            elapsed_ms = response.processing_time_ms,
            "retrieval complete"
        );

        response
    }

    /// Registered source names, in fan-out order
    pub fn source_names(&self) -> Vec<&'static str> {
        self.retrievers.iter().map(|r| r.name()).collect()
    }
}

/// Results requested from one source: its weight share of the overall budget,
/// over-fetched by half so the merge has slack, floored at one.
fn per_source_budget(source: &str, weights: &SourceWeights, max_results: usize) -> usize {
    let weight = if source == SourceKind::Memory.as_str() {
        weights.memory
    } else if source == SourceKind::Content.as_str() {
        weights.content
    } else if source == SourceKind::WebSearch.as_str() {
        weights.web
    } else {
        1.0 / 3.0
    };

    ((weight * max_results as f64 * 1.5).ceil() as usize).max(1)
}
