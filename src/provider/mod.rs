//! Language-model capability
//!
//! The engine consumes generation as a capability: a provider turns a prompt
//! plus tool schemas into an ordered stream of generation events. Model
//! inference itself lives behind this boundary.

pub mod http;
pub mod parser;

pub use http::HttpModelProvider;
pub use parser::JsonParser;

use crate::errors::{EngineError, Result};
use crate::tools::{ToolCall, ToolSchema};
use crate::types::Message;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;

/// One event in a model's generation stream
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Incremental text fragment, in generation order
    TextDelta(String),

    /// The model requests a tool call this step
    ToolCall(ToolCall),

    /// End of a model/tool interaction step
    StepFinish,

    /// Generation complete, no further tool calls
    Finish,
}

/// Prompt handed to a provider for one generation step
#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

/// Stream type produced by providers
pub type GenerationStream = BoxStream<'static, Result<GenerationEvent>>;

/// Generation capability consumed by the completion engine
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    /// Model identifier this provider serves
    fn model(&self) -> &str;

    /// Start one generation step; events arrive in generation order.
    async fn stream_generate(&self, prompt: GenerationPrompt) -> Result<GenerationStream>;
}

/// Resolves model names to providers.
///
/// Resolution failures are hard, pre-stream errors: a request naming an
/// unknown model is rejected before anything is streamed.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LanguageModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn LanguageModelProvider>) {
        self.providers
            .insert(provider.model().to_string(), provider);
    }

    pub fn resolve(&self, model: &str) -> Result<Arc<dyn LanguageModelProvider>> {
        self.providers
            .get(model)
            .cloned()
            .ok_or_else(|| EngineError::ModelUnavailable(model.to_string()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
