//! Accounts bounded context.
//!
//! Registers accounts and validates their email addresses. Every state change
//! is written together with the domain events describing it; the relay pumps
//! deliver those events to handlers such as [`EmailValidationSender`].

pub mod application;
pub mod domain;
pub mod error;

pub use application::email_validation::{EmailMessage, EmailValidationSender, LogMailer, MailError, Mailer};
pub use application::repository::AccountRepository;
pub use domain::events::{AccountEvent, account_event_registry};
pub use error::AccountError;
