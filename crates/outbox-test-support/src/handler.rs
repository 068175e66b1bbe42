//! Test handlers: `DomainEventHandler` implementations for pump tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use outbox_core::event::{DomainEvent, EventBody};
use outbox_core::handler::{DomainEventHandler, HandlerError};

/// A handler that records every event it completes. Individual event ids can
/// be scripted to fail or to hang forever.
#[derive(Debug)]
pub struct RecordingHandler<B> {
    handled: Mutex<Vec<DomainEvent<B>>>,
    attempted: Mutex<Vec<String>>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
}

impl<B: EventBody> Default for RecordingHandler<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: EventBody> RecordingHandler<B> {
    /// Creates a handler that accepts every event.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handled: Mutex::new(Vec::new()),
            attempted: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            stalling: HashSet::new(),
        }
    }

    /// Makes the handler return an error for `event_id`.
    #[must_use]
    pub fn failing_on(mut self, event_id: &str) -> Self {
        self.failing.insert(event_id.to_owned());
        self
    }

    /// Makes the handler never complete for `event_id`.
    #[must_use]
    pub fn stalling_on(mut self, event_id: &str) -> Self {
        self.stalling.insert(event_id.to_owned());
        self
    }

    /// Returns a snapshot of successfully handled events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handled(&self) -> Vec<DomainEvent<B>> {
        self.handled.lock().unwrap().clone()
    }

    /// Returns the ids of every event the handler was invoked with.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    /// Polls until at least `count` events were handled or `timeout` passes,
    /// then returns what was handled.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<DomainEvent<B>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let handled = self.handled();
            if handled.len() >= count || tokio::time::Instant::now() >= deadline {
                return handled;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl<B: EventBody> DomainEventHandler<B> for RecordingHandler<B> {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn process_domain_event(&self, event: &DomainEvent<B>) -> Result<(), HandlerError> {
        self.attempted.lock().unwrap().push(event.id.clone());
        if self.stalling.contains(&event.id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&event.id) {
            return Err(format!("scripted failure for {}", event.id).into());
        }
        self.handled.lock().unwrap().push(event.clone());
        Ok(())
    }
}
