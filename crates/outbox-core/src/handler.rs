//! Downstream event handler contract.

use async_trait::async_trait;

use crate::event::{DomainEvent, EventBody};

/// Error type handlers return. Handlers own their failure modes; the pump
/// only logs them.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A side-effecting subscriber to domain events.
#[async_trait]
pub trait DomainEventHandler<B: EventBody>: Send + Sync {
    /// Handler name used in logs.
    fn name(&self) -> &'static str;

    /// Processes one event. May be cancelled if it exceeds the pump's
    /// timeout, so it should be safe to run again for the same event.
    async fn process_domain_event(&self, event: &DomainEvent<B>) -> Result<(), HandlerError>;
}
