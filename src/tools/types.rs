//! Tool execution types
//!
//! Shapes exchanged between the generation loop, the tool executor, and the
//! output stream. Tool failures are always values (`success: false`), never
//! errors, so a failing tool degrades the step instead of aborting the loop.

use crate::retrieval::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique id for correlating the result
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// A cited result surfaced to the caller, deduplicated by `(id, source)`
/// across a generation session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    pub snippet: String,
    pub relevance_score: f64,
    /// True the first (and only) time this identity reaches the caller
    pub is_new_reference: bool,
}

impl Reference {
    /// Identity used for session-wide deduplication
    pub fn identity(&self) -> (String, String) {
        (self.id.clone(), self.source.clone())
    }
}

const SNIPPET_MAX: usize = 280;

impl From<&RetrievalResult> for Reference {
    fn from(result: &RetrievalResult) -> Self {
        let title = result
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let snippet: String = result.content.chars().take(SNIPPET_MAX).collect();

        Self {
            id: result.id.clone(),
            source: result.source.clone(),
            title,
            snippet,
            relevance_score: result.relevance_score,
            is_new_reference: false,
        }
    }
}

/// Outcome of one tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub tool: String,
    pub success: bool,
    /// Structured payload fed back to the model
    pub payload: serde_json::Value,
    /// Identifiable references carried by this result
    pub references: Vec<Reference>,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn success(
        call: &ToolCall,
        payload: serde_json::Value,
        references: Vec<Reference>,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            success: true,
            payload,
            references,
            error: None,
            duration_ms,
        }
    }

    /// Structured failure returned to the model instead of an error
    pub fn failure(call: &ToolCall, error: impl Into<String>, duration_ms: u64) -> Self {
        let error = error.into();
        Self {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            success: false,
            payload: serde_json::json!({ "error": error }),
            references: Vec::new(),
            error: Some(error),
            duration_ms,
        }
    }
}

/// Per-session log entry for one tool execution round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub iteration: usize,
    pub tool_name: String,
    /// Identities first surfaced by this execution
    pub new_reference_ids: HashSet<(String, String)>,
}

/// Tool definition exposed to the model (JSON Schema parameters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
