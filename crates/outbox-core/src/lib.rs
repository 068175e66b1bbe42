//! Outbox Core: shared abstractions for the transactional outbox.
//!
//! This crate defines the domain event envelope, the event type registry,
//! the aggregate-with-events envelope, and the contracts that storage,
//! repositories, and handlers implement. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod id;
pub mod registry;
pub mod repository;
pub mod store;
