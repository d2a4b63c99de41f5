//! Output stream events
//!
//! Discriminated events emitted to the caller over a long-lived connection,
//! one JSON object per line, each carrying a `type` tag. Events for a request
//! are emitted in causal order: a tool-result event is never emitted after
//! text that was generated from that tool's output.

use crate::tools::Reference;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// Incremental answer text
    #[serde(rename_all = "camelCase")]
    Text { model: String, content: String },

    /// Outcome of one tool execution
    #[serde(rename_all = "camelCase")]
    ToolResults {
        model: String,
        tool: String,
        call_id: String,
        success: bool,
        payload: serde_json::Value,
    },

    /// Newly surfaced references from a tool round
    #[serde(rename_all = "camelCase")]
    MemorySources {
        model: String,
        sources: Vec<Reference>,
        reference_summary: Option<String>,
    },

    /// Title generated for a brand-new conversation
    #[serde(rename_all = "camelCase")]
    ConversationTitle { title: String },

    /// Coarse progress marker; `model: None` for request-wide stages
    #[serde(rename_all = "camelCase")]
    Progress { model: Option<String>, stage: String },

    /// Inline error for one model's task; siblings keep streaming
    #[serde(rename_all = "camelCase")]
    Error { model: Option<String>, message: String },
}

impl StreamEvent {
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Text {
            model: model.into(),
            content: content.into(),
        }
    }

    pub fn progress(model: Option<String>, stage: impl Into<String>) -> Self {
        Self::Progress {
            model,
            stage: stage.into(),
        }
    }

    pub fn error(model: Option<String>, message: impl Into<String>) -> Self {
        Self::Error {
            model,
            message: message.into(),
        }
    }

    /// Serialize as one newline-terminated JSON object
    pub fn to_line(&self) -> serde_json::Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_event_tag() {
        let event = StreamEvent::text("clone-v1", "hello");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"content\":\"hello\""));
    }

    #[test]
    fn test_tool_results_tag_camel_case() {
        let event = StreamEvent::ToolResults {
            model: "clone-v1".to_string(),
            tool: "web_search".to_string(),
            call_id: "c1".to_string(),
            success: true,
            payload: serde_json::json!({}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"toolResults\""));
        assert!(json.contains("\"callId\":\"c1\""));
    }

    #[test]
    fn test_memory_sources_tag() {
        let event = StreamEvent::MemorySources {
            model: "clone-v1".to_string(),
            sources: vec![],
            reference_summary: Some("2 sources".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"memorySources\""));
        assert!(json.contains("\"referenceSummary\""));
    }

    #[test]
    fn test_to_line_newline_terminated() {
        let line = StreamEvent::progress(None, "retrieving").to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert!(!line[..line.len() - 1].contains('\n'));
    }

    #[test]
    fn test_event_roundtrip() {
        let event = StreamEvent::error(Some("clone-v1".to_string()), "boom");
        let json = serde_json::to_string(&event).unwrap();
        let parsed: StreamEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            StreamEvent::Error { model, message } => {
                assert_eq!(model.as_deref(), Some("clone-v1"));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
