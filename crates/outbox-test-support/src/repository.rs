//! Test repositories: mock `DomainEventRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use outbox_core::error::{RepositoryError, StoreError};
use outbox_core::event::{DomainEvent, EventBody};
use outbox_core::repository::{DomainEventRepository, EventStream};
use outbox_core::store::Since;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// An event repository that keeps inserted events in memory, rejects
/// duplicate event ids with a conflict like the real store does, and
/// streams new inserts to subscribers. Publishing an event twice conflicts.
#[derive(Debug)]
pub struct RecordingEventRepository<B> {
    stored: Mutex<Vec<DomainEvent<B>>>,
    attempts: Mutex<Vec<String>>,
    feed: broadcast::Sender<DomainEvent<B>>,
}

impl<B: EventBody> Default for RecordingEventRepository<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: EventBody> RecordingEventRepository<B> {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        Self {
            stored: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            feed,
        }
    }

    /// Returns a snapshot of all events that were stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stored_events(&self) -> Vec<DomainEvent<B>> {
        self.stored.lock().unwrap().clone()
    }

    /// Returns the event ids of every insert attempt, including duplicates.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl<B: EventBody> DomainEventRepository<B> for RecordingEventRepository<B> {
    async fn insert(&self, event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError> {
        self.attempts.lock().unwrap().push(event.id.clone());
        {
            let mut stored = self.stored.lock().unwrap();
            if stored.iter().any(|existing| existing.id == event.id) {
                return Err(StoreError::Conflict {
                    id: event.document_id(),
                }
                .into());
            }
            stored.push(event.clone());
        }
        let _ = self.feed.send(event.clone());
        Ok(event.clone())
    }

    async fn get(&self, event_id: &str) -> Result<DomainEvent<B>, RepositoryError> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .find(|event| event.id == event_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound {
                    id: event_id.to_owned(),
                }
                .into()
            })
    }

    async fn mark_published(&self, event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError> {
        let mut stored = self.stored.lock().unwrap();
        let existing = stored
            .iter_mut()
            .find(|existing| existing.id == event.id)
            .ok_or_else(|| StoreError::NotFound {
                id: event.document_id(),
            })?;
        if existing.published_at.is_some() {
            return Err(StoreError::Conflict {
                id: event.document_id(),
            }
            .into());
        }
        existing.published_at = event.published_at;
        Ok(existing.clone())
    }

    async fn stream_of_events(&self, since: Since) -> Result<EventStream<B>, RepositoryError> {
        let receiver = self.feed.subscribe();
        let backlog = match since {
            Since::Beginning => self.stored_events(),
            Since::Now | Since::After(_) => Vec::new(),
        };
        let live = BroadcastStream::new(receiver)
            .filter_map(|item| futures::future::ready(item.ok()));
        Ok(Box::pin(futures::stream::iter(backlog).chain(live)))
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

fn refused() -> RepositoryError {
    StoreError::Connection("connection refused".into()).into()
}

#[async_trait]
impl<B: EventBody> DomainEventRepository<B> for FailingEventRepository {
    async fn insert(&self, _event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError> {
        Err(refused())
    }

    async fn get(&self, _event_id: &str) -> Result<DomainEvent<B>, RepositoryError> {
        Err(refused())
    }

    async fn mark_published(&self, _event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError> {
        Err(refused())
    }

    async fn stream_of_events(&self, _since: Since) -> Result<EventStream<B>, RepositoryError> {
        Err(refused())
    }
}
