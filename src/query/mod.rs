//! Query analysis for source weighting

pub mod analyzer;

pub use analyzer::{QueryAnalysis, QueryAnalyzer, QueryIntent, SourceWeights};
