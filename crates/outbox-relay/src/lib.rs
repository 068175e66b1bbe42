//! Outbox relay.
//!
//! Writes aggregates together with their pending events, moves those events
//! into a domain event repository, and delivers them to handlers:
//!
//! - [`AggregateWriter`]: one document write per aggregate change.
//! - [`ExtractionPump`]: follows documents with pending events and stores
//!   each event as its own document, then clears the field.
//! - [`DocumentEventRepository`]: the store-backed event repository.
//! - [`MessagePump`]: follows stored events and dispatches them to a
//!   [`DomainEventHandler`](outbox_core::handler::DomainEventHandler).

pub mod config;
pub mod event_repository;
pub mod extraction;
pub mod feed;
pub mod handle;
pub mod message_pump;
pub mod writer;

#[cfg(test)]
mod testing;

pub use config::PumpConfig;
pub use event_repository::DocumentEventRepository;
pub use extraction::{Extraction, ExtractionPump};
pub use handle::{PumpError, PumpHandle};
pub use message_pump::{Delivery, MessagePump};
pub use writer::{AggregateWriter, SecondaryDocument};
