//! Stream writer
//!
//! Serializes ordered events to the caller's transport (an mpsc channel the
//! caller drains, e.g. into an SSE response). Once the receiver is gone the
//! connection is considered closed: subsequent writes are skipped, not
//! retried, while in-flight work keeps running so partial results can still
//! be persisted.

use crate::streaming::events::StreamEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Channel capacity; bounded so a slow consumer applies backpressure
pub const CHANNEL_CAPACITY: usize = 256;

/// Ordered event sink for one request
#[derive(Debug)]
pub struct StreamWriter {
    sender: mpsc::Sender<StreamEvent>,
    closed: AtomicBool,
}

impl StreamWriter {
    /// Create a writer and the receiver the caller drains
    pub fn channel() -> (Self, mpsc::Receiver<StreamEvent>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                sender,
                closed: AtomicBool::new(false),
            },
            receiver,
        )
    }

    /// Emit one event. Silently skipped once the transport is closed.
    pub async fn emit(&self, event: StreamEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        if self.sender.send(event).await.is_err() {
            debug!("client disconnected, skipping further writes");
            self.closed.store(true, Ordering::Release);
        }
    }

    /// Whether the transport has reported the connection closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
