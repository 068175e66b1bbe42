//! Aggregate write path.
//!
//! Persists an aggregate and its pending events as one document write, plus
//! any secondary lookup documents the aggregate type needs.

use std::sync::Arc;

use outbox_core::aggregate::{Aggregate, WithEvents};
use outbox_core::error::{RepositoryError, StoreError};
use outbox_core::event::EventBody;
use outbox_core::registry::EventRegistry;
use outbox_core::store::{DocumentStore, Revision};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// An extra document written alongside an aggregate, such as a unique-key
/// index.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryDocument {
    /// Document id. Inserts conflict if it already exists.
    pub id: String,
    /// Document body.
    pub body: Value,
}

/// Writes aggregates with their pending events.
pub struct AggregateWriter<B> {
    store: Arc<dyn DocumentStore>,
    registry: Arc<EventRegistry<B>>,
}

impl<B: EventBody> AggregateWriter<B> {
    /// Creates a writer over `store`, encoding events through `registry`.
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<EventRegistry<B>>) -> Self {
        Self { store, registry }
    }

    /// The store this writer persists to.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Reads an aggregate with the events still pending on its document.
    ///
    /// # Errors
    ///
    /// Returns `Store(NotFound)` if the document is absent, other store
    /// errors verbatim, and codec errors for undecodable pending events.
    #[instrument(skip(self))]
    pub async fn load<A: Aggregate>(&self, id: &str) -> Result<WithEvents<A, B>, RepositoryError> {
        let document = self.store.get(id).await?;
        WithEvents::load(&document, &self.registry)
    }

    /// Inserts a new aggregate document carrying its pending events, then
    /// each secondary document in order.
    ///
    /// The aggregate document is the atomicity boundary: once it is written
    /// its events are durable. A failing secondary insert is reported as a
    /// failure of the whole write; the aggregate document is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns `Store(Conflict)` if the aggregate or a secondary document
    /// already exists, other store errors verbatim, and codec errors for
    /// unregistered events.
    #[instrument(skip(self, envelope, secondary), fields(doc_id = %envelope.aggregate().document_id()))]
    pub async fn insert<A: Aggregate>(
        &self,
        envelope: WithEvents<A, B>,
        secondary: &[SecondaryDocument],
    ) -> Result<A, RepositoryError> {
        let body = envelope.to_document(&self.registry)?;
        let pending = envelope.events().len();
        let (mut aggregate, _) = envelope.into_parts();
        let id = aggregate.document_id();

        let rev = self.store.insert(&id, body).await?;
        debug!(rev = %rev, pending, "aggregate inserted");

        for document in secondary {
            if let Err(err) = self.store.insert(&document.id, document.body.clone()).await {
                warn!(
                    secondary_id = %document.id,
                    error = %err,
                    "secondary document insert failed after aggregate was written"
                );
                return Err(err.into());
            }
        }

        aggregate.set_revision(rev);
        Ok(aggregate)
    }

    /// Replaces an aggregate document at the revision it was loaded at,
    /// carrying its pending events.
    ///
    /// # Errors
    ///
    /// Returns `Store(Conflict)` if the aggregate was changed since it was
    /// loaded, `Store(Request)` if it was never loaded, other store errors
    /// verbatim, and codec errors for unregistered events.
    #[instrument(skip(self, envelope), fields(doc_id = %envelope.aggregate().document_id()))]
    pub async fn update<A: Aggregate>(&self, envelope: WithEvents<A, B>) -> Result<A, RepositoryError> {
        let body = envelope.to_document(&self.registry)?;
        let pending = envelope.events().len();
        let (mut aggregate, _) = envelope.into_parts();
        let id = aggregate.document_id();
        let expected: Revision = aggregate.revision().cloned().ok_or_else(|| {
            StoreError::Request(format!("cannot update {id}: aggregate has no revision"))
        })?;

        let rev = self.store.update(&id, &expected, body).await?;
        debug!(rev = %rev, pending, "aggregate updated");

        aggregate.set_revision(rev);
        Ok(aggregate)
    }
}
