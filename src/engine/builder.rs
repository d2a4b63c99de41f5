//! Engine assembly
//!
//! Wires configuration and collaborators into a ready `CompletionEngine`:
//! the conversation cache takes its TTL and history bound from `CacheConfig`,
//! the web retriever takes the configured search timeout, and each registered
//! source backend serves both the initial fan-out and its tool.

use crate::cache::ConversationCache;
use crate::config::EngineConfig;
use crate::engine::completion::CompletionEngine;
use crate::errors::{EngineError, Result};
use crate::persistence::{ErrorReporter, LogReporter, PersistenceStore};
use crate::provider::{LanguageModelProvider, ProviderRegistry};
use crate::retrieval::{
    ContentRetriever, ContentSearch, MemoryRetriever, MemorySearch, RetrievalOrchestrator,
    SourceRetriever, WebSearch, WebSearchRetriever,
};
use crate::tools::{ToolExecutor, ToolRegistry};
use std::sync::Arc;

/// Builder for a fully wired completion engine
pub struct EngineBuilder {
    config: EngineConfig,
    providers: ProviderRegistry,
    memory: Option<Arc<dyn MemorySearch>>,
    content: Option<Arc<dyn ContentSearch>>,
    web: Option<Arc<dyn WebSearch>>,
    store: Option<Arc<dyn PersistenceStore>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            providers: ProviderRegistry::new(),
            memory: None,
            content: None,
            web: None,
            store: None,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LanguageModelProvider>) -> Self {
        self.providers.register(provider);
        self
    }

    pub fn memory_backend(mut self, backend: Arc<dyn MemorySearch>) -> Self {
        self.memory = Some(backend);
        self
    }

    pub fn content_backend(mut self, backend: Arc<dyn ContentSearch>) -> Self {
        self.content = Some(backend);
        self
    }

    pub fn web_backend(mut self, backend: Arc<dyn WebSearch>) -> Self {
        self.web = Some(backend);
        self
    }

    pub fn store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Assemble the engine. A persistence store and at least one model
    /// provider are required; knowledge sources are optional.
    pub fn build(self) -> Result<Arc<CompletionEngine>> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Config("a persistence store is required".to_string()))?;

        if self.providers.is_empty() {
            return Err(EngineError::Config(
                "at least one model provider is required".to_string(),
            ));
        }

        let cache = Arc::new(ConversationCache::from_config(&self.config.cache));

        let mut retrievers: Vec<Arc<dyn SourceRetriever>> = Vec::new();
        if let Some(backend) = self.memory {
            retrievers.push(Arc::new(MemoryRetriever::new(backend)));
        }
        if let Some(backend) = self.content {
            retrievers.push(Arc::new(ContentRetriever::new(backend)));
        }
        if let Some(backend) = self.web {
            retrievers.push(Arc::new(
                WebSearchRetriever::new(backend, Arc::clone(&cache))
                    .with_timeout(self.config.retrieval.web_search_timeout()),
            ));
        }

        let orchestrator = Arc::new(RetrievalOrchestrator::new(
            retrievers.clone(),
            self.config.retrieval.clone(),
        ));
        let executor = Arc::new(ToolExecutor::new(&retrievers));

        Ok(Arc::new(CompletionEngine::new(
            self.config,
            self.providers,
            orchestrator,
            executor,
            ToolRegistry::new(),
            cache,
            store,
            self.reporter,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use crate::provider::{GenerationPrompt, GenerationStream};
    use async_trait::async_trait;

    struct IdleProvider;

    #[async_trait]
    impl LanguageModelProvider for IdleProvider {
        fn model(&self) -> &str {
            "clone-v1"
        }

        async fn stream_generate(&self, _prompt: GenerationPrompt) -> Result<GenerationStream> {
            Ok(Box::pin(futures_util::stream::empty()))
        }
    }

    #[test]
    fn test_build_requires_store() {
        let result = EngineBuilder::new(EngineConfig::default())
            .provider(Arc::new(IdleProvider))
            .build();

        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_build_requires_a_provider() {
        let result = EngineBuilder::new(EngineConfig::default())
            .store(Arc::new(InMemoryStore::new()))
            .build();

        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_build_with_minimal_collaborators() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .provider(Arc::new(IdleProvider))
            .store(Arc::new(InMemoryStore::new()))
            .build()
            .unwrap();

        assert!(engine.retrieval().source_names().is_empty());
    }
}
