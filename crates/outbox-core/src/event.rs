//! Domain event abstractions.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::id::IdGenerator;
use crate::store::Revision;

/// Prefix of every extracted event document id.
pub const EVENT_DOCUMENT_PREFIX: &str = "domain_event:";

/// Returns the store document id for the event with the given id.
///
/// Derived deterministically so a second insert of the same event collides
/// with the first.
#[must_use]
pub fn event_document_id(event_id: &str) -> String {
    format!("{EVENT_DOCUMENT_PREFIX}{event_id}")
}

/// A closed set of event payload shapes.
///
/// Implemented by an enum with one variant per payload. `kind` names the
/// variant in code; the [`EventRegistry`](crate::registry::EventRegistry)
/// maps kinds to stable wire names, so variants can be renamed without
/// breaking persisted events.
pub trait EventBody: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Every kind [`kind`](EventBody::kind) can return.
    const KINDS: &'static [&'static str];

    /// Returns the in-code kind of this payload.
    fn kind(&self) -> &'static str;

    /// Encodes the payload fields.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be encoded.
    fn encode(&self) -> Result<Value, serde_json::Error>;

    /// Decodes a payload of the given kind.
    ///
    /// # Errors
    ///
    /// Returns a serializer error if `body` does not match the shape of
    /// `kind`, or if `kind` is not one of this type's variants.
    fn decode(kind: &'static str, body: Value) -> Result<Self, serde_json::Error>;
}

/// Envelope around an event payload.
///
/// The body is immutable once created. Only `published_at` may change, and
/// only once.
#[derive(Debug, Clone)]
pub struct DomainEvent<B> {
    /// Globally unique, URL-safe identifier.
    pub id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set when a downstream consumer delivers the event.
    pub published_at: Option<DateTime<Utc>>,
    /// Event-specific payload.
    pub body: B,
    /// Storage revision. Not part of the event's identity.
    pub rev: Option<Revision>,
}

impl<B: EventBody> DomainEvent<B> {
    /// Creates a new unpublished event stamped with a fresh id and the
    /// current time.
    pub fn new(body: B, clock: &dyn Clock, ids: &dyn IdGenerator) -> Self {
        Self {
            id: ids.next_id(),
            created_at: clock.now(),
            published_at: None,
            body,
            rev: None,
        }
    }

    /// Returns the document id this event is stored under once extracted.
    #[must_use]
    pub fn document_id(&self) -> String {
        event_document_id(&self.id)
    }

    /// Returns `true` once the event has been marked published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Marks the event published at `at`. Returns `false` and leaves the
    /// original timestamp untouched if it was already published.
    pub fn mark_published(&mut self, at: DateTime<Utc>) -> bool {
        if self.published_at.is_some() {
            return false;
        }
        self.published_at = Some(at);
        true
    }
}

impl<B: PartialEq> PartialEq for DomainEvent<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.created_at == other.created_at
            && self.published_at == other.published_at
            && self.body == other.body
    }
}

/// Wire representation of an event: `{id, created_at, published_at, type, body}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event id.
    pub id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Publication time, `null` until published.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Registry wire name of the body.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Shape-specific payload.
    #[serde(default)]
    pub body: Value,
}
