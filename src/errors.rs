//! Error types for the persona engine
//!
//! Failures below the generation boundary are absorbed by their components
//! (retrievers and tools degrade to empty results). The variants here cover
//! everything that must surface: pre-stream rejection, mid-stream failures,
//! and infrastructure errors.

use thiserror::Error;

/// Main error type for the orchestration engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Session state machine transition errors
    #[error("Invalid session transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Requested model cannot be resolved (hard, pre-stream)
    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    /// Model stream failed mid-generation
    #[error("Stream generation error: {0}")]
    StreamGeneration(String),

    /// Incremental JSON extraction errors
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Model provider API errors
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine assembly and configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("Engine error: {0}")]
    Generic(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Generic(err.to_string())
    }
}
