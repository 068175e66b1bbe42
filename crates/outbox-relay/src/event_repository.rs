//! Document-store implementation of the `DomainEventRepository` trait.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use outbox_core::error::{RepositoryError, StoreError};
use outbox_core::event::{DomainEvent, EventBody, event_document_id};
use outbox_core::registry::EventRegistry;
use outbox_core::repository::{DomainEventRepository, EventStream};
use outbox_core::store::{ChangeFilter, Document, DocumentStore, Since};
use tracing::{debug, error, instrument};

use crate::config::PumpConfig;
use crate::feed::resumable_changes;

/// Stores each extracted event as its own `domain_event:{id}` document.
pub struct DocumentEventRepository<B> {
    store: Arc<dyn DocumentStore>,
    registry: Arc<EventRegistry<B>>,
    config: PumpConfig,
}

impl<B: EventBody> DocumentEventRepository<B> {
    /// Creates a repository over `store`, encoding through `registry`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<EventRegistry<B>>,
        config: PumpConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    fn decode(registry: &EventRegistry<B>, document: Document) -> Result<DomainEvent<B>, RepositoryError> {
        let mut event = registry.decode(document.body)?;
        event.rev = Some(document.rev);
        Ok(event)
    }
}

#[async_trait]
impl<B: EventBody> DomainEventRepository<B> for DocumentEventRepository<B> {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn insert(&self, event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError> {
        let body = self.registry.encode(event)?;
        let rev = self.store.insert(&event.document_id(), body).await?;
        debug!(rev = %rev, "domain event stored");
        let mut stored = event.clone();
        stored.rev = Some(rev);
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn get(&self, event_id: &str) -> Result<DomainEvent<B>, RepositoryError> {
        let document = self.store.get(&event_document_id(event_id)).await?;
        Self::decode(&self.registry, document)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn mark_published(&self, event: &DomainEvent<B>) -> Result<DomainEvent<B>, RepositoryError> {
        let rev = event.rev.as_ref().ok_or_else(|| {
            StoreError::Request(format!("event {} has no revision to publish at", event.id))
        })?;
        let body = self.registry.encode(event)?;
        let new_rev = self.store.update(&event.document_id(), rev, body).await?;
        debug!(rev = %new_rev, "domain event marked published");
        let mut published = event.clone();
        published.rev = Some(new_rev);
        Ok(published)
    }

    async fn stream_of_events(&self, since: Since) -> Result<EventStream<B>, RepositoryError> {
        let changes = resumable_changes(
            Arc::clone(&self.store),
            ChangeFilter::DomainEvents,
            since,
            self.config.clone(),
        )
        .await?;
        let registry = Arc::clone(&self.registry);
        let events = changes.filter_map(move |change| {
            let doc_id = change.document.id.clone();
            let decoded = match Self::decode(&registry, change.document) {
                Ok(event) => Some(event),
                Err(err) => {
                    error!(doc_id = %doc_id, error = %err, "skipping undecodable domain event");
                    None
                }
            };
            futures::future::ready(decoded)
        });
        Ok(Box::pin(events))
    }
}
