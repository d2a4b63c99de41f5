//! Tool registry with JSON schemas
//!
//! Maintains the retrieval-backed tools the model may call:
//! - search_memory: personal memory store
//! - search_content: structured content store
//! - web_search: live web search (cached per conversation)

use crate::tools::types::ToolSchema;
use serde_json::json;
use std::collections::HashMap;

/// Tool registry
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSchema>,
}

impl ToolRegistry {
    /// Create registry with all retrieval tools
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register_search_memory();
        registry.register_search_content();
        registry.register_web_search();

        registry
    }

    fn register_search_memory(&mut self) {
        let schema = ToolSchema::new(
            "search_memory",
            "Search the persona's personal memory for relevant past facts and conversations",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for in memory"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum results to return",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        );
        self.tools.insert("search_memory".to_string(), schema);
    }

    fn register_search_content(&mut self) {
        let schema = ToolSchema::new(
            "search_content",
            "Search the persona's published content (posts, articles, media)",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for in published content"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum results to return",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        );
        self.tools.insert("search_content".to_string(), schema);
    }

    fn register_web_search(&mut self) {
        let schema = ToolSchema::new(
            "web_search",
            "Search the live web for current information. Do not repeat a search already listed in the conversation's recent searches.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Web search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum results to return",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 10
                    }
                },
                "required": ["query"]
            }),
        );
        self.tools.insert("web_search".to_string(), schema);
    }

    /// Get tool schema by name
    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name)
    }

    /// Check if tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool schemas, cloned for prompt assembly
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().cloned().collect()
    }

    /// All tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Hard cap on results a tool call may request, matching the schema maxima
pub fn max_results_cap(tool: &str) -> usize {
    match tool {
        "web_search" => 10,
        _ => 20,
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
