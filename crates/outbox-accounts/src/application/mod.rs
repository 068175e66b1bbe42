//! Application services for the Accounts context.

pub mod command_handlers;
pub mod email_validation;
pub mod query_handlers;
pub mod repository;
