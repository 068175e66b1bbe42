//! CouchDB document store for the outbox relay.
//!
//! Implements [`DocumentStore`](outbox_core::store::DocumentStore) over
//! CouchDB's HTTP API. Change feeds use the continuous `_changes` endpoint
//! with server-side filters installed by [`CouchDocumentStore::bootstrap`].

pub mod changes;
pub mod client;
pub mod config;
pub mod design;

pub use client::CouchDocumentStore;
pub use config::CouchConfig;
