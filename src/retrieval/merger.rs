//! Result merging
//!
//! Combines all source result sets into one deduplicated, score-sorted,
//! confidence-classified response. Pure computation, no side effects.
//!
//! Dedup rule: results sharing an `(id, source)` identity keep the
//! highest-scoring occurrence; on an exact score tie the first-seen occurrence
//! wins. Both rules are deterministic for a given input order.

use crate::retrieval::{ConfidenceLevel, RetrievalResponse, RetrievalResult};
use std::collections::HashMap;

/// Merges retriever outputs into a single response
#[derive(Debug, Clone, Default)]
pub struct ResultMerger;

impl ResultMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge result sets for `query`, capped to `max_results`.
    pub fn merge(
        &self,
        result_sets: Vec<Vec<RetrievalResult>>,
        query: &str,
        max_results: usize,
    ) -> RetrievalResponse {
        let mut order: Vec<(String, String)> = Vec::new();
        let mut best: HashMap<(String, String), RetrievalResult> = HashMap::new();

        for result in result_sets.into_iter().flatten() {
            let key = result.identity();
            match best.get(&key) {
                Some(existing) if existing.relevance_score >= result.relevance_score => {}
                Some(_) => {
                    best.insert(key, result);
                }
                None => {
                    order.push(key.clone());
                    best.insert(key, result);
                }
            }
        }

        let mut results: Vec<RetrievalResult> = order
            .into_iter()
            .filter_map(|key| best.remove(&key))
            .collect();

        // Stable sort keeps first-seen order among equal scores
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(max_results);

        let confidence = classify_confidence(&results);
        let sources_used = contributing_sources(&results);

        RetrievalResponse {
            query: query.to_string(),
            total_results: results.len(),
            results,
            confidence,
            sources_used,
            processing_time_ms: 0,
        }
    }
}

/// Classify confidence from the surviving result set.
///
/// `None` iff empty; `High` needs a top-3 mean >= 0.8 and at least 3 results;
/// `Medium` needs a top-3 mean >= 0.5; everything else is `Low`.
fn classify_confidence(results: &[RetrievalResult]) -> ConfidenceLevel {
    if results.is_empty() {
        return ConfidenceLevel::None;
    }

    let top = &results[..results.len().min(3)];
    let mean = top.iter().map(|r| r.relevance_score).sum::<f64>() / top.len() as f64;

    if mean >= 0.8 && results.len() >= 3 {
        ConfidenceLevel::High
    } else if mean >= 0.5 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Distinct sources that contributed at least one surviving result,
/// in order of first appearance
fn contributing_sources(results: &[RetrievalResult]) -> Vec<String> {
    let mut sources = Vec::new();
    for result in results {
        if !sources.contains(&result.source) {
            sources.push(result.source.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, source: &str, score: f64) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            content: format!("content for {id}"),
            relevance_score: score,
            source: source.to_string(),
            result_type: None,
            created_at: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_merge_sorts_descending() {
        let merged = ResultMerger::new().merge(
            vec![
                vec![result("a", "memory", 0.3), result("b", "memory", 0.9)],
                vec![result("c", "content", 0.6)],
            ],
            "q",
            10,
        );

        let scores: Vec<f64> = merged.results.iter().map(|r| r.relevance_score).collect();
        assert_eq!(scores, vec![0.9, 0.6, 0.3]);
    }

    #[test]
    fn test_merge_dedup_keeps_highest_score() {
        let merged = ResultMerger::new().merge(
            vec![
                vec![result("a", "content", 0.4)],
                vec![result("a", "content", 0.7)],
            ],
            "q",
            10,
        );

        assert_eq!(merged.total_results, 1);
        assert_eq!(merged.results[0].relevance_score, 0.7);
    }

    #[test]
    fn test_merge_same_id_different_source_not_deduped() {
        let merged = ResultMerger::new().merge(
            vec![
                vec![result("a", "memory", 0.5)],
                vec![result("a", "content", 0.5)],
            ],
            "q",
            10,
        );

        assert_eq!(merged.total_results, 2);
    }

    #[test]
    fn test_merge_caps_to_max_results() {
        let merged = ResultMerger::new().merge(
            vec![(0..20)
                .map(|i| result(&format!("r{i}"), "memory", 0.5))
                .collect()],
            "q",
            5,
        );

        assert_eq!(merged.total_results, 5);
        assert_eq!(merged.results.len(), 5);
    }

    #[test]
    fn test_confidence_none_iff_empty() {
        let merged = ResultMerger::new().merge(vec![vec![], vec![]], "q", 10);
        assert_eq!(merged.confidence, ConfidenceLevel::None);
        assert_eq!(merged.total_results, 0);
    }

    #[test]
    fn test_confidence_high() {
        // Top-3 mean 0.85, count >= 3
        let merged = ResultMerger::new().merge(
            vec![vec![
                result("a", "memory", 0.9),
                result("b", "memory", 0.85),
                result("c", "content", 0.8),
            ]],
            "q",
            10,
        );
        assert_eq!(merged.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_confidence_high_needs_three_results() {
        // Mean is 0.9 but only two results
        let merged = ResultMerger::new().merge(
            vec![vec![result("a", "memory", 0.9), result("b", "memory", 0.9)]],
            "q",
            10,
        );
        assert_eq!(merged.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_confidence_medium() {
        let merged = ResultMerger::new().merge(
            vec![vec![
                result("a", "memory", 0.6),
                result("b", "memory", 0.6),
                result("c", "memory", 0.6),
            ]],
            "q",
            10,
        );
        assert_eq!(merged.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_confidence_low() {
        let merged = ResultMerger::new().merge(
            vec![vec![result("a", "memory", 0.3)]],
            "q",
            10,
        );
        assert_eq!(merged.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn test_sources_used_only_survivors() {
        // Web result is pushed out by the cap, so web_search must not appear
        let merged = ResultMerger::new().merge(
            vec![
                vec![result("a", "memory", 0.9), result("b", "content", 0.8)],
                vec![result("c", "web_search", 0.1)],
            ],
            "q",
            2,
        );

        assert_eq!(merged.sources_used, vec!["memory", "content"]);
    }

    #[quickcheck_macros::quickcheck]
    fn prop_merge_sorted_bounded_unique(raw: Vec<(u8, u8, u8)>, max: u8) -> bool {
        let sources = ["memory", "content", "web_search"];
        let results: Vec<RetrievalResult> = raw
            .iter()
            .map(|(id, source, score)| {
                result(
                    &format!("r{}", id % 16),
                    sources[(*source as usize) % sources.len()],
                    f64::from(*score) / 255.0,
                )
            })
            .collect();

        let merged = ResultMerger::new().merge(vec![results], "q", max as usize);

        let sorted = merged
            .results
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score);

        let mut identities: Vec<_> = merged.results.iter().map(|r| r.identity()).collect();
        let before = identities.len();
        identities.sort();
        identities.dedup();

        sorted && merged.results.len() <= max as usize && before == identities.len()
    }

    #[test]
    fn test_no_duplicate_identities_in_output() {
        let merged = ResultMerger::new().merge(
            vec![
                vec![result("a", "memory", 0.5), result("a", "memory", 0.9)],
                vec![result("a", "memory", 0.7), result("b", "memory", 0.2)],
            ],
            "q",
            10,
        );

        let mut identities: Vec<_> = merged.results.iter().map(|r| r.identity()).collect();
        let before = identities.len();
        identities.sort();
        identities.dedup();
        assert_eq!(before, identities.len());
    }
}
