//! The agentic completion engine

pub mod builder;
pub mod completion;
pub mod prompt;
pub mod references;
pub mod state;

pub use builder::EngineBuilder;
pub use completion::CompletionEngine;
pub use references::ReferenceTracker;
pub use state::{SessionEvent, SessionState};
