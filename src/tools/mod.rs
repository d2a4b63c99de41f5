//! Retrieval-backed tools exposed to the model

pub mod executor;
pub mod registry;
pub mod types;

pub use executor::{ToolExecutor, ToolInvocationContext};
pub use registry::ToolRegistry;
pub use types::{Reference, ToolCall, ToolExecutionRecord, ToolOutput, ToolSchema};
