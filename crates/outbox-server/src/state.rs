//! Shared application state.

use std::sync::Arc;

use crate::worker::Worker;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The running pumps.
    pub worker: Arc<Worker>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }
}
