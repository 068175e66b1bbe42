//! Message pump.
//!
//! Follows the stream of stored domain events and hands each one to a
//! handler. Before the handler runs, the event is marked published in the
//! repository at the revision it was read at; an event that is already
//! published, or that another dispatcher claimed first, is skipped. This
//! lets the pump replay the whole stream on every start. Handler failures
//! and timeouts are logged and not retried.

use std::sync::Arc;

use futures::StreamExt;
use outbox_core::clock::Clock;
use outbox_core::event::{DomainEvent, EventBody};
use outbox_core::handler::DomainEventHandler;
use outbox_core::repository::{DomainEventRepository, EventStream};
use outbox_core::store::Since;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::PumpConfig;
use crate::handle::{PumpError, PumpHandle, shutdown_requested};

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event was published earlier and was not handed to the handler.
    AlreadyPublished,
    /// The handler completed successfully.
    Delivered,
    /// The handler returned an error.
    Failed,
    /// The handler did not finish within the configured timeout.
    TimedOut,
}

/// Delivers domain events to a handler.
pub struct MessagePump<B> {
    events: Arc<dyn DomainEventRepository<B>>,
    handler: Arc<dyn DomainEventHandler<B>>,
    clock: Arc<dyn Clock>,
    config: PumpConfig,
    since: Since,
}

impl<B: EventBody> MessagePump<B> {
    /// Creates an idle pump that replays every unpublished event, then
    /// follows new ones.
    pub fn new(
        events: Arc<dyn DomainEventRepository<B>>,
        handler: Arc<dyn DomainEventHandler<B>>,
        clock: Arc<dyn Clock>,
        config: PumpConfig,
    ) -> Self {
        Self {
            events,
            handler,
            clock,
            config,
            since: Since::Beginning,
        }
    }

    /// Sets the feed position the pump starts from.
    #[must_use]
    pub fn with_since(mut self, since: Since) -> Self {
        self.since = since;
        self
    }

    /// Subscribes to the event stream and starts dispatching on a background
    /// task. Events are handled one at a time, in feed order.
    ///
    /// # Errors
    ///
    /// Returns `PumpError::Subscribe` if the initial subscription fails.
    pub async fn start(self) -> Result<PumpHandle, PumpError> {
        let events = self.events.stream_of_events(self.since.clone()).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        info!(pump = "message", handler = self.handler.name(), "pump started");
        let task = tokio::spawn(self.run(events, shutdown_rx));
        Ok(PumpHandle::new("message", shutdown_tx, task))
    }

    async fn run(self, mut events: EventStream<B>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => break,
                next = events.next() => match next {
                    Some(event) => {
                        self.dispatch(event).await;
                    }
                    None => break,
                },
            }
        }
    }

    /// Marks `event` published and runs the handler on it.
    ///
    /// If persisting the publication fails for any reason other than a
    /// conflict, the handler still runs and the event may be delivered
    /// again after a restart.
    #[instrument(skip(self, event), fields(event_id = %event.id, handler = self.handler.name()))]
    pub async fn dispatch(&self, mut event: DomainEvent<B>) -> Delivery {
        if !event.mark_published(self.clock.now()) {
            debug!("event already published");
            return Delivery::AlreadyPublished;
        }
        match self.events.mark_published(&event).await {
            Ok(published) => event = published,
            Err(err) if err.is_conflict() => {
                debug!("event claimed by an earlier delivery");
                return Delivery::AlreadyPublished;
            }
            Err(err) => warn!(error = %err, "failed to persist publication; handling anyway"),
        }

        let outcome = tokio::time::timeout(
            self.config.handler_timeout,
            self.handler.process_domain_event(&event),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                debug!("event handled");
                Delivery::Delivered
            }
            Ok(Err(err)) => {
                warn!(error = %err, "handler failed; event will not be retried");
                Delivery::Failed
            }
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(self.config.handler_timeout.as_millis()).unwrap_or(u64::MAX),
                    "handler timed out; event will not be retried"
                );
                Delivery::TimedOut
            }
        }
    }
}
