//! Domain event repository abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::RepositoryError;
use crate::event::{DomainEvent, EventBody};
use crate::store::Since;

/// Live feed of extracted events, decoded through the registry.
pub type EventStream<B> = Pin<Box<dyn Stream<Item = DomainEvent<B>> + Send>>;

/// Durable, independently addressable storage for extracted events.
#[async_trait]
pub trait DomainEventRepository<B: EventBody>: Send + Sync {
    /// Stores an event under a document id derived from its own id.
    ///
    /// A second insert of the same event fails with a conflict rather than
    /// creating a duplicate.
    async fn insert(&self, event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError>;

    /// Loads a stored event by event id.
    async fn get(&self, event_id: &str) -> Result<DomainEvent<B>, RepositoryError>;

    /// Persists the `published_at` of an event at the revision it was read
    /// at. Fails with a conflict if another dispatcher got there first.
    async fn mark_published(&self, event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError>;

    /// Subscribes to events as they are stored. The stream ends when dropped.
    async fn stream_of_events(&self, since: Since) -> Result<EventStream<B>, RepositoryError>;
}
