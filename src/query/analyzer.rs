//! Query intent analysis
//!
//! Classifies a raw query into weighted intents that bias how many results are
//! requested from each knowledge source. Pure function of its input: no I/O,
//! never fails. Ambiguous queries fall back to a balanced weighting so every
//! source still gets consulted.

use serde::{Deserialize, Serialize};

/// Recognized query intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// About the persona itself or shared history ("you", "your", "we")
    Personal,
    /// Current events, recency-sensitive ("latest", "news", "today")
    News,
    /// Asks for a stance or judgement ("think", "opinion", "feel")
    Opinion,
    /// Lookup of a stable fact ("what is", "how does", "define")
    Factual,
    /// Anything that matches no signal
    General,
}

/// Relative weight assigned to each source, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    pub memory: f64,
    pub content: f64,
    pub web: f64,
}

impl SourceWeights {
    /// Equal weighting across all sources
    pub fn balanced() -> Self {
        Self {
            memory: 1.0 / 3.0,
            content: 1.0 / 3.0,
            web: 1.0 / 3.0,
        }
    }

    /// Normalize so the weights sum to 1.0
    fn normalized(self) -> Self {
        let total = self.memory + self.content + self.web;
        if total <= f64::EPSILON {
            return Self::balanced();
        }
        Self {
            memory: self.memory / total,
            content: self.content / total,
            web: self.web / total,
        }
    }
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Result of analyzing a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Detected intents with their signal strength, strongest first
    pub intents: Vec<(QueryIntent, f64)>,

    /// Per-source weights used to distribute `max_results`
    pub weights: SourceWeights,

    /// Rough confidence in the classification, in [0, 1]
    pub confidence_hint: f64,
}

impl QueryAnalysis {
    /// Balanced default used for empty or unclassifiable queries
    pub fn balanced() -> Self {
        Self {
            intents: vec![(QueryIntent::General, 1.0)],
            weights: SourceWeights::balanced(),
            confidence_hint: 0.0,
        }
    }

    /// Strongest detected intent
    pub fn primary_intent(&self) -> QueryIntent {
        self.intents
            .first()
            .map(|(intent, _)| *intent)
            .unwrap_or(QueryIntent::General)
    }
}

const PERSONAL_SIGNALS: &[&str] = &[
    "you", "your", "yours", "we", "our", "remember", "told me", "last time",
];

const NEWS_SIGNALS: &[&str] = &[
    "latest", "news", "today", "recent", "current", "this week", "now", "update",
];

const OPINION_SIGNALS: &[&str] = &[
    "think", "opinion", "feel", "believe", "view", "stance", "take on",
];

const FACTUAL_SIGNALS: &[&str] = &[
    "what is", "what are", "how does", "how do", "define", "explain", "when did", "who is",
];

/// Keyword-heuristic query analyzer
#[derive(Debug, Clone, Default)]
pub struct QueryAnalyzer;

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a query into weighted intents and source weights.
    ///
    /// Weights only bias distribution; no source is ever excluded outright,
    /// so a floor is applied to each weight before normalization.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() {
            return QueryAnalysis::balanced();
        }

        let mut scores: Vec<(QueryIntent, f64)> = vec![
            (QueryIntent::Personal, signal_score(&normalized, PERSONAL_SIGNALS)),
            (QueryIntent::News, signal_score(&normalized, NEWS_SIGNALS)),
            (QueryIntent::Opinion, signal_score(&normalized, OPINION_SIGNALS)),
            (QueryIntent::Factual, signal_score(&normalized, FACTUAL_SIGNALS)),
        ];

        scores.retain(|(_, score)| *score > 0.0);
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        if scores.is_empty() {
            return QueryAnalysis::balanced();
        }

        let weights = Self::weights_for(&scores);
        let confidence_hint = scores.first().map(|(_, s)| s.min(1.0)).unwrap_or(0.0);

        QueryAnalysis {
            intents: scores,
            weights,
            confidence_hint,
        }
    }

    fn weights_for(scores: &[(QueryIntent, f64)]) -> SourceWeights {
        // Floor keeps every source in play regardless of intent skew
        let mut weights = SourceWeights {
            memory: 0.15,
            content: 0.15,
            web: 0.15,
        };

        for (intent, score) in scores {
            match intent {
                QueryIntent::Personal => {
                    weights.memory += 0.5 * score;
                    weights.content += 0.2 * score;
                }
                QueryIntent::News => {
                    weights.web += 0.6 * score;
                    weights.content += 0.1 * score;
                }
                QueryIntent::Opinion => {
                    weights.memory += 0.35 * score;
                    weights.content += 0.35 * score;
                }
                QueryIntent::Factual => {
                    weights.content += 0.3 * score;
                    weights.web += 0.3 * score;
                }
                QueryIntent::General => {}
            }
        }

        weights.normalized()
    }
}

fn signal_score(query: &str, signals: &[&str]) -> f64 {
    let hits = signals.iter().filter(|s| query.contains(*s)).count();
    match hits {
        0 => 0.0,
        1 => 0.6,
        2 => 0.85,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights_sum(w: &SourceWeights) -> f64 {
        w.memory + w.content + w.web
    }

    #[test]
    fn test_empty_query_balanced() {
        let analysis = QueryAnalyzer::new().analyze("   ");
        assert_eq!(analysis.primary_intent(), QueryIntent::General);
        assert!((weights_sum(&analysis.weights) - 1.0).abs() < 1e-9);
        assert_eq!(analysis.confidence_hint, 0.0);
    }

    #[test]
    fn test_news_query_favors_web() {
        let analysis = QueryAnalyzer::new().analyze("What is the latest AI news today?");
        assert!(analysis.weights.web > analysis.weights.memory);
        assert!(analysis
            .intents
            .iter()
            .any(|(intent, _)| *intent == QueryIntent::News));
    }

    #[test]
    fn test_personal_query_favors_memory() {
        let analysis = QueryAnalyzer::new().analyze("Do you remember what we discussed last time?");
        assert_eq!(analysis.primary_intent(), QueryIntent::Personal);
        assert!(analysis.weights.memory > analysis.weights.web);
    }

    #[test]
    fn test_opinion_query_detected() {
        let analysis = QueryAnalyzer::new().analyze("What do you think about remote work?");
        assert!(analysis
            .intents
            .iter()
            .any(|(intent, _)| *intent == QueryIntent::Opinion));
    }

    #[test]
    fn test_no_source_excluded() {
        // Even a strongly skewed query keeps a floor weight on every source
        let analysis = QueryAnalyzer::new().analyze("latest news update today now");
        assert!(analysis.weights.memory > 0.0);
        assert!(analysis.weights.content > 0.0);
        assert!(analysis.weights.web > 0.0);
    }

    #[test]
    fn test_gibberish_falls_back_to_balanced() {
        let analysis = QueryAnalyzer::new().analyze("xyzzy plugh qwerty");
        assert_eq!(analysis.primary_intent(), QueryIntent::General);
        assert_eq!(analysis.weights, SourceWeights::balanced());
    }

    #[test]
    fn test_weights_always_normalized() {
        for query in ["", "latest news", "you remember", "what is rust", "opinion?"] {
            let analysis = QueryAnalyzer::new().analyze(query);
            assert!((weights_sum(&analysis.weights) - 1.0).abs() < 1e-9, "query: {query}");
        }
    }
}
