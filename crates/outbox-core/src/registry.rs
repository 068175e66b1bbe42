//! Event type registry.
//!
//! Maps the in-code kind of each [`EventBody`] variant to a stable wire
//! name and back. A registry is built once at process start and shared
//! read-only afterwards. Only kinds the body type declares in
//! [`EventBody::KINDS`] can be registered, each under one wire name.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::error::{EventCodecError, RegistryError};
use crate::event::{DomainEvent, EventBody, EventRecord};

/// Bidirectional kind ⇄ wire-name table for one event body type.
pub struct EventRegistry<B> {
    wire_by_kind: HashMap<&'static str, &'static str>,
    kind_by_wire: HashMap<&'static str, &'static str>,
    _body: PhantomData<fn() -> B>,
}

impl<B> fmt::Debug for EventRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("wire_by_kind", &self.wire_by_kind)
            .finish_non_exhaustive()
    }
}

impl<B> Default for EventRegistry<B> {
    fn default() -> Self {
        Self {
            wire_by_kind: HashMap::new(),
            kind_by_wire: HashMap::new(),
            _body: PhantomData,
        }
    }
}

impl<B: EventBody> EventRegistry<B> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kind` under `wire_name`.
    ///
    /// # Panics
    ///
    /// Panics on any [`RegistryError`]. Registries are built once at
    /// startup, where a wiring mistake should stop the process; use
    /// [`EventRegistry::try_register`] to handle the error instead.
    #[must_use]
    pub fn register(self, kind: &'static str, wire_name: &'static str) -> Self {
        match self.try_register(kind, wire_name) {
            Ok(registry) => registry,
            Err(err) => panic!("{err}"),
        }
    }

    /// Registers `kind` under `wire_name`.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredKind` if `kind` is not in [`EventBody::KINDS`],
    /// `DuplicateKind` if it already has a wire name, and
    /// `DuplicateWireName` if another kind already uses `wire_name`.
    pub fn try_register(
        mut self,
        kind: &'static str,
        wire_name: &'static str,
    ) -> Result<Self, RegistryError> {
        if !B::KINDS.contains(&kind) {
            return Err(RegistryError::UndeclaredKind { kind });
        }
        if let Some(&existing) = self.wire_by_kind.get(kind) {
            return Err(RegistryError::DuplicateKind {
                kind,
                wire_name: existing,
            });
        }
        if let Some(&existing) = self.kind_by_wire.get(wire_name) {
            return Err(RegistryError::DuplicateWireName {
                wire_name,
                kind: existing,
            });
        }
        self.wire_by_kind.insert(kind, wire_name);
        self.kind_by_wire.insert(wire_name, kind);
        Ok(self)
    }

    /// Declared kinds that have no wire name yet, in declaration order.
    #[must_use]
    pub fn missing_kinds(&self) -> Vec<&'static str> {
        B::KINDS
            .iter()
            .copied()
            .filter(|kind| !self.wire_by_kind.contains_key(kind))
            .collect()
    }

    /// Returns the wire name registered for `kind`.
    #[must_use]
    pub fn wire_name(&self, kind: &str) -> Option<&'static str> {
        self.wire_by_kind.get(kind).copied()
    }

    /// Returns the kind registered under `wire_name`.
    #[must_use]
    pub fn kind(&self, wire_name: &str) -> Option<&'static str> {
        self.kind_by_wire.get(wire_name).copied()
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wire_by_kind.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wire_by_kind.is_empty()
    }

    /// Converts an event into its wire record.
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredType` if the body kind has no wire name, and
    /// `Malformed` if the body fails to encode.
    pub fn to_record(&self, event: &DomainEvent<B>) -> Result<EventRecord, EventCodecError> {
        let kind = event.body.kind();
        let wire_name = self
            .wire_name(kind)
            .ok_or(EventCodecError::UnregisteredType { kind })?;
        Ok(EventRecord {
            id: event.id.clone(),
            created_at: event.created_at,
            published_at: event.published_at,
            event_type: wire_name.to_owned(),
            body: event.body.encode()?,
        })
    }

    /// Reconstructs an event from its wire record.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEventType` if the wire name is not registered,
    /// `EmptyBody` if the record has no body, and `Malformed` if the body
    /// does not match the registered shape.
    pub fn from_record(&self, record: EventRecord) -> Result<DomainEvent<B>, EventCodecError> {
        let kind = self
            .kind(&record.event_type)
            .ok_or_else(|| EventCodecError::UnknownEventType {
                wire_name: record.event_type.clone(),
            })?;
        if record.body.is_null() {
            return Err(EventCodecError::EmptyBody);
        }
        Ok(DomainEvent {
            id: record.id,
            created_at: record.created_at,
            published_at: record.published_at,
            body: B::decode(kind, record.body)?,
            rev: None,
        })
    }

    /// Encodes an event as a JSON value.
    ///
    /// # Errors
    ///
    /// See [`EventRegistry::to_record`].
    pub fn encode(&self, event: &DomainEvent<B>) -> Result<Value, EventCodecError> {
        Ok(serde_json::to_value(self.to_record(event)?)?)
    }

    /// Decodes an event from a JSON value. Unknown top-level fields (such as
    /// store metadata) are ignored.
    ///
    /// # Errors
    ///
    /// See [`EventRegistry::from_record`].
    pub fn decode(&self, value: Value) -> Result<DomainEvent<B>, EventCodecError> {
        self.from_record(serde_json::from_value(value)?)
    }

    /// Serializes an event to JSON bytes.
    ///
    /// # Errors
    ///
    /// See [`EventRegistry::to_record`].
    pub fn marshal(&self, event: &DomainEvent<B>) -> Result<Vec<u8>, EventCodecError> {
        Ok(serde_json::to_vec(&self.to_record(event)?)?)
    }

    /// Deserializes an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// See [`EventRegistry::from_record`].
    pub fn unmarshal(&self, bytes: &[u8]) -> Result<DomainEvent<B>, EventCodecError> {
        self.from_record(serde_json::from_slice(bytes)?)
    }
}
