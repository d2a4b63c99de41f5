//! Session-wide reference deduplication
//!
//! Tracks every `(id, source)` identity already surfaced to the caller during
//! a generation session. The set only grows; an identity that was emitted
//! once is never forwarded again, so the same citation card cannot appear
//! twice across tool-call rounds or concurrent model tasks on the same
//! conversation.

use crate::tools::Reference;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ReferenceTracker {
    seen: HashSet<(String, String)>,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter out already-seen identities, record the rest, and return them
    /// tagged as new references.
    pub fn filter_new(&mut self, references: &[Reference]) -> Vec<Reference> {
        let mut fresh = Vec::new();
        for reference in references {
            let identity = reference.identity();
            if self.seen.insert(identity) {
                let mut reference = reference.clone();
                reference.is_new_reference = true;
                fresh.push(reference);
            }
        }
        fresh
    }

    /// Identities surfaced so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, id: &str, source: &str) -> bool {
        self.seen.contains(&(id.to_string(), source.to_string()))
    }
}
