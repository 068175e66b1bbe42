//! Deterministic `IdGenerator` implementations for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use outbox_core::id::IdGenerator;

/// Generates `{prefix}-1`, `{prefix}-2`, ... in order.
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    next: AtomicUsize,
}

impl SequenceIds {
    /// Creates a generator whose ids start with `prefix`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            next: AtomicUsize::new(1),
        }
    }
}

impl Default for SequenceIds {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}
