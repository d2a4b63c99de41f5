//! persona-engine
//!
//! Retrieval-and-generation orchestration for a conversational digital
//! clone. A completion request fans out over memory, content, and web
//! sources, merges the hits into a persona system prompt, then drives one
//! tool-augmented generation session per requested model, streaming ordered
//! events back to the caller.
//!
//! The engine is transport-agnostic: callers drain an event channel and own
//! the wire format. Model providers, persistence, and error reporting are
//! traits supplied at construction time.

pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod persistence;
pub mod provider;
pub mod query;
pub mod retrieval;
pub mod streaming;
pub mod tools;
pub mod types;

pub use cache::ConversationCache;
pub use config::EngineConfig;
pub use engine::{CompletionEngine, EngineBuilder};
pub use errors::{EngineError, Result};
pub use persistence::{ErrorReporter, PersistenceStore};
pub use provider::LanguageModelProvider;
pub use retrieval::RetrievalOrchestrator;
pub use streaming::{StreamEvent, StreamWriter};
pub use types::{CompletionRequest, Message, PersonaContext, Role};
