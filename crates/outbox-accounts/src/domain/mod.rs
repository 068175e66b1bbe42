//! Domain model for the Accounts context.

pub mod aggregates;
pub mod commands;
pub mod email;
pub mod events;
