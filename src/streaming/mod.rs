//! Ordered output event protocol and transport writer

pub mod events;
pub mod writer;

pub use events::StreamEvent;
pub use writer::StreamWriter;
