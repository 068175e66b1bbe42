//! Event extraction pump.
//!
//! Follows the change feed of documents that carry pending events. For each
//! change it stores every pending event in the domain event repository, then
//! clears the pending field on the source document at the revision the feed
//! delivered. Inserts are idempotent on event id, so redelivery of the same
//! change is harmless. A change whose insert or clear step fails is retried
//! with backoff before the pump reads the next one, since the feed will not
//! deliver that document again until it changes.

use std::sync::Arc;

use outbox_core::aggregate::{clear_pending_events, pending_events};
use outbox_core::error::RepositoryError;
use outbox_core::event::EventBody;
use outbox_core::registry::EventRegistry;
use outbox_core::repository::DomainEventRepository;
use outbox_core::store::{Change, ChangeFilter, DocumentStore, Since, strip_metadata};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PumpConfig;
use crate::feed::{ResumableChanges, resumable_changes};
use crate::handle::{PumpError, PumpHandle, shutdown_requested};

/// What happened to one change delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// All pending events are stored and the field was cleared.
    Extracted {
        /// Number of events on the document.
        events: usize,
    },
    /// The document carried no pending events.
    NothingPending,
    /// The pending events could not be decoded; the document is untouched.
    Undecodable,
    /// An event insert failed; the document is untouched.
    InsertFailed,
    /// The events are stored but the document moved on before it could be
    /// cleared. Its newer revision will be delivered separately.
    Superseded,
    /// The events are stored but clearing the field failed.
    ClearFailed,
}

impl Extraction {
    /// Returns `true` for outcomes that leave events pending because of a
    /// store failure.
    #[must_use]
    pub fn should_retry(self) -> bool {
        matches!(self, Self::InsertFailed | Self::ClearFailed)
    }
}

/// Moves pending events from aggregate documents into the event repository.
pub struct ExtractionPump<B> {
    store: Arc<dyn DocumentStore>,
    events: Arc<dyn DomainEventRepository<B>>,
    registry: Arc<EventRegistry<B>>,
    config: PumpConfig,
}

impl<B: EventBody> ExtractionPump<B> {
    /// Creates an idle pump.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        events: Arc<dyn DomainEventRepository<B>>,
        registry: Arc<EventRegistry<B>>,
        config: PumpConfig,
    ) -> Self {
        Self {
            store,
            events,
            registry,
            config,
        }
    }

    /// Subscribes to documents with pending events and starts processing
    /// them on a background task.
    ///
    /// The feed starts from the beginning: only documents still carrying
    /// events match, so a restart picks up exactly the unfinished work.
    ///
    /// # Errors
    ///
    /// Returns `PumpError::Subscribe` if the initial subscription fails.
    pub async fn start(self) -> Result<PumpHandle, PumpError> {
        let changes = resumable_changes(
            Arc::clone(&self.store),
            ChangeFilter::PendingEvents,
            Since::Beginning,
            self.config.clone(),
        )
        .await
        .map_err(RepositoryError::from)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(changes, shutdown_rx));
        info!(pump = "extraction", "pump started");
        Ok(PumpHandle::new("extraction", shutdown_tx, task))
    }

    async fn run(self, mut changes: ResumableChanges, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => break,
                next = changes.next() => match next {
                    Some(change) => {
                        if !self.settle(&change, &mut shutdown).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }

    /// Processes `change` until it no longer needs a retry. Returns `false`
    /// if shutdown was requested while backing off.
    async fn settle(&self, change: &Change, shutdown: &mut watch::Receiver<bool>) -> bool {
        let mut failures = 0u32;
        loop {
            if !self.process_change(change).await.should_retry() {
                return true;
            }
            let delay = self.config.reconnect_delay(failures);
            failures = failures.saturating_add(1);
            warn!(
                doc_id = %change.document.id,
                failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying extraction"
            );
            tokio::select! {
                biased;
                () = shutdown_requested(shutdown) => return false,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Extracts the pending events of one change delivery.
    #[instrument(skip(self, change), fields(doc_id = %change.document.id, rev = %change.document.rev))]
    pub async fn process_change(&self, change: &Change) -> Extraction {
        let document = &change.document;
        let events = match pending_events(&document.body, &self.registry) {
            Ok(events) => events,
            Err(err) => {
                error!(error = %err, "cannot decode pending events; leaving document untouched");
                return Extraction::Undecodable;
            }
        };
        if events.is_empty() {
            return Extraction::NothingPending;
        }

        for event in &events {
            match self.events.insert(event).await {
                Ok(_) => debug!(event_id = %event.id, "pending event stored"),
                Err(err) if err.is_conflict() => {
                    debug!(event_id = %event.id, "pending event already stored");
                }
                Err(err) => {
                    warn!(
                        event_id = %event.id,
                        error = %err,
                        "failed to store pending event; leaving document for redelivery"
                    );
                    return Extraction::InsertFailed;
                }
            }
        }

        let mut body = document.body.clone();
        clear_pending_events(&mut body);
        strip_metadata(&mut body);
        match self.store.update(&document.id, &document.rev, body).await {
            Ok(rev) => {
                debug!(new_rev = %rev, events = events.len(), "pending events cleared");
                Extraction::Extracted {
                    events: events.len(),
                }
            }
            Err(err) if err.is_conflict() => {
                debug!("document moved on before pending events were cleared");
                Extraction::Superseded
            }
            Err(err) => {
                warn!(error = %err, "failed to clear pending events");
                Extraction::ClearFailed
            }
        }
    }
}
