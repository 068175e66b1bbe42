//! Aggregate-with-events envelope.
//!
//! An aggregate is written as a single document. Events produced by a use
//! case ride along on that same document in the `events` field until the
//! extraction pump moves them into the event repository and clears the
//! field.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EventCodecError, RepositoryError, StoreError};
use crate::event::{DomainEvent, EventBody, EventRecord};
use crate::registry::EventRegistry;
use crate::store::{Document, PENDING_EVENTS_FIELD, Revision};

/// An entity persisted as one document.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync {
    /// Returns the store document id.
    fn document_id(&self) -> String;

    /// Returns the revision this instance was loaded at, if any.
    fn revision(&self) -> Option<&Revision>;

    /// Records the revision assigned by the store.
    fn set_revision(&mut self, rev: Revision);

    /// Decodes an aggregate from a stored document and records its revision.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the body does not match.
    fn from_document(document: &Document) -> Result<Self, StoreError> {
        let mut aggregate: Self = document.decode()?;
        aggregate.set_revision(document.rev.clone());
        Ok(aggregate)
    }
}

/// An aggregate plus the events pending on its next write.
#[derive(Debug, Clone)]
pub struct WithEvents<A, B> {
    aggregate: A,
    events: Vec<DomainEvent<B>>,
}

impl<A: Aggregate, B: EventBody> WithEvents<A, B> {
    /// Wraps an aggregate with an empty event list.
    pub fn of(aggregate: A) -> Self {
        Self {
            aggregate,
            events: Vec::new(),
        }
    }

    /// Appends an event. Order is preserved and nothing is deduplicated.
    pub fn add_event(&mut self, event: DomainEvent<B>) {
        self.events.push(event);
    }

    /// The wrapped aggregate.
    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    /// Mutable access to the wrapped aggregate.
    pub fn aggregate_mut(&mut self) -> &mut A {
        &mut self.aggregate
    }

    /// Events pending on this write.
    pub fn events(&self) -> &[DomainEvent<B>] {
        &self.events
    }

    /// Loads an aggregate from its stored document together with the events
    /// still pending on it, so that the next write carries them forward.
    ///
    /// # Errors
    ///
    /// Returns a store error if the body does not decode as `A`, or a codec
    /// error if a pending event cannot be decoded.
    pub fn load(document: &Document, registry: &EventRegistry<B>) -> Result<Self, RepositoryError> {
        let aggregate = A::from_document(document)?;
        let events = pending_events(&document.body, registry)?;
        Ok(Self { aggregate, events })
    }

    /// Unwraps into the aggregate and its pending events.
    pub fn into_parts(self) -> (A, Vec<DomainEvent<B>>) {
        (self.aggregate, self.events)
    }

    /// Builds the document body: the aggregate's fields plus the pending
    /// events encoded through `registry`. The events field is omitted when
    /// there are none.
    ///
    /// # Errors
    ///
    /// Returns a codec error if an event is unregistered or the aggregate
    /// does not serialize to a JSON object.
    pub fn to_document(&self, registry: &EventRegistry<B>) -> Result<Value, EventCodecError> {
        let mut body = serde_json::to_value(&self.aggregate)?;
        let Some(object) = body.as_object_mut() else {
            return Err(EventCodecError::Malformed(serde::ser::Error::custom(
                "aggregate must serialize to a JSON object",
            )));
        };
        object.remove(PENDING_EVENTS_FIELD);
        if !self.events.is_empty() {
            let records = self
                .events
                .iter()
                .map(|event| registry.to_record(event))
                .collect::<Result<Vec<_>, _>>()?;
            object.insert(PENDING_EVENTS_FIELD.to_owned(), serde_json::to_value(records)?);
        }
        Ok(body)
    }
}

/// Decodes the pending events carried by a document body. A missing or
/// `null` field yields an empty list.
///
/// # Errors
///
/// Returns a codec error if any record is malformed or of an unknown type.
pub fn pending_events<B: EventBody>(
    body: &Value,
    registry: &EventRegistry<B>,
) -> Result<Vec<DomainEvent<B>>, EventCodecError> {
    match body.get(PENDING_EVENTS_FIELD) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(field) => {
            let records: Vec<EventRecord> = serde_json::from_value(field.clone())?;
            records
                .into_iter()
                .map(|record| registry.from_record(record))
                .collect()
        }
    }
}

/// Removes the pending-events field from a document body.
pub fn clear_pending_events(body: &mut Value) {
    if let Some(object) = body.as_object_mut() {
        object.remove(PENDING_EVENTS_FIELD);
    }
}
