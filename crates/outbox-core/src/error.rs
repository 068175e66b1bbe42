//! Error taxonomy shared by stores, codecs, and repositories.

use thiserror::Error;

/// Errors surfaced by a [`DocumentStore`](crate::store::DocumentStore).
///
/// Stores never retry internally; callers branch on the variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transport or infrastructure failure. Usually transient.
    #[error("connection error: {0}")]
    Connection(String),

    /// The document already exists, or the presented revision is stale.
    #[error("conflict on document {id}")]
    Conflict {
        /// The contended document id.
        id: String,
    },

    /// The document does not exist.
    #[error("document not found: {id}")]
    NotFound {
        /// The missing document id.
        id: String,
    },

    /// The outgoing request was malformed or rejected as invalid.
    #[error("request error: {0}")]
    Request(String),

    /// A document body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns `true` for optimistic-concurrency and duplicate-id conflicts.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if the document was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised while encoding or decoding a domain event.
#[derive(Debug, Error)]
pub enum EventCodecError {
    /// The body's kind has no wire name in the registry.
    #[error("event body kind {kind:?} is not registered")]
    UnregisteredType {
        /// The in-code kind of the body.
        kind: &'static str,
    },

    /// The event carries no body.
    #[error("event body is empty")]
    EmptyBody,

    /// The wire name has no local registration. A producer is ahead of this
    /// consumer.
    #[error("unknown event type {wire_name:?}")]
    UnknownEventType {
        /// The wire name read from the envelope.
        wire_name: String,
    },

    /// The envelope or body did not have the expected shape.
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Wiring mistakes caught while building an
/// [`EventRegistry`](crate::registry::EventRegistry).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The kind is not one of the body type's declared kinds.
    #[error("event kind {kind:?} is not declared by the body type")]
    UndeclaredKind {
        /// The rejected kind.
        kind: &'static str,
    },

    /// The kind already has a wire name.
    #[error("event kind {kind:?} is already registered as {wire_name:?}")]
    DuplicateKind {
        /// The kind registered twice.
        kind: &'static str,
        /// Its existing wire name.
        wire_name: &'static str,
    },

    /// Another kind already uses the wire name.
    #[error("wire name {wire_name:?} is already registered for kind {kind:?}")]
    DuplicateWireName {
        /// The contested wire name.
        wire_name: &'static str,
        /// The kind that holds it.
        kind: &'static str,
    },
}

/// Errors returned by a [`DomainEventRepository`](crate::repository::DomainEventRepository).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] EventCodecError),
}

impl RepositoryError {
    /// Returns `true` if the store reported a conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_conflict())
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("{name} is invalid ({value:?}): {reason}")]
    Invalid {
        /// Setting name.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Builds an `Invalid` error.
    pub fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            value: value.to_owned(),
            reason: reason.to_string(),
        }
    }
}
