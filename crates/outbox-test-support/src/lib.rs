//! Shared test doubles for the outbox workspace.

mod clock;
mod flaky_store;
mod handler;
mod ids;
mod memory_store;
mod repository;

pub use clock::FixedClock;
pub use flaky_store::FlakyDocumentStore;
pub use handler::RecordingHandler;
pub use ids::SequenceIds;
pub use memory_store::MemoryDocumentStore;
pub use repository::{FailingEventRepository, RecordingEventRepository};
