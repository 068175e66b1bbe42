//! Document store contract.
//!
//! A single-document, optimistic-concurrency store with a change feed.
//! Bodies travel as JSON values; store metadata (`_id`, `_rev`) is added on
//! read and ignored on write.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::event::EVENT_DOCUMENT_PREFIX;

/// Name of the field that carries pending events on an aggregate document.
pub const PENDING_EVENTS_FIELD: &str = "events";

/// Opaque storage revision token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Revision {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Revision observed at read time.
    pub rev: Revision,
    /// Document body, including `_id` and `_rev`.
    pub body: Value,
}

impl Document {
    /// Decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// One delivery from a change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Feed position of this change, usable with [`Since::After`].
    pub seq: String,
    /// The document at the revision that triggered the change.
    pub document: Document,
}

/// Named server-side filters for change feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeFilter {
    /// Documents whose pending-events field is a non-empty array.
    PendingEvents,
    /// Extracted domain event documents.
    DomainEvents,
}

impl ChangeFilter {
    /// Name of the filter function in the store's design document.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PendingEvents => "pending_events",
            Self::DomainEvents => "domain_events",
        }
    }

    /// Evaluates the filter locally against a document.
    #[must_use]
    pub fn matches(self, id: &str, body: &Value) -> bool {
        match self {
            Self::PendingEvents => body
                .get(PENDING_EVENTS_FIELD)
                .and_then(Value::as_array)
                .is_some_and(|events| !events.is_empty()),
            Self::DomainEvents => id.starts_with(EVENT_DOCUMENT_PREFIX),
        }
    }
}

/// Where a change feed starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Since {
    /// Replay the current state of every matching document, then follow.
    Beginning,
    /// Only changes made after subscribing.
    Now,
    /// Changes after the given feed position.
    After(String),
}

/// Live, open-ended feed of changes. Dropping it unsubscribes.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<Change, StoreError>> + Send>>;

/// Minimal CRUD plus change feed over a document database.
///
/// Implementations are safe for concurrent use and never retry internally.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document. Fails with `Conflict` if `id` already exists.
    async fn insert(&self, id: &str, body: Value) -> Result<Revision, StoreError>;

    /// Reads a document. Fails with `NotFound` if absent.
    async fn get(&self, id: &str) -> Result<Document, StoreError>;

    /// Replaces a document if its current revision is `rev`. Fails with
    /// `Conflict` if the revision is stale.
    async fn update(&self, id: &str, rev: &Revision, body: Value) -> Result<Revision, StoreError>;

    /// Subscribes to changes of documents matching `filter`.
    ///
    /// Delivery is at-least-once and approximately in write order.
    async fn subscribe(&self, filter: ChangeFilter, since: Since) -> Result<ChangeStream, StoreError>;
}

/// Removes store metadata keys from a body before it is written.
pub fn strip_metadata(body: &mut Value) {
    if let Some(object) = body.as_object_mut() {
        object.remove("_id");
        object.remove("_rev");
    }
}
