//! Sends verification mails for `EmailValidationRequested` events.

use std::sync::Arc;

use async_trait::async_trait;
use outbox_core::event::DomainEvent;
use outbox_core::handler::{DomainEventHandler, HandlerError};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::domain::events::{AccountEvent, EmailValidationRequested};

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Mail transport failure.
#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Delivers emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends one message.
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Development transport that only logs each message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, body = %message.body, "mail sent");
        Ok(())
    }
}

/// Domain event handler that mails a verification link to the owner of a
/// newly registered address. Other events are ignored.
pub struct EmailValidationSender {
    mailer: Arc<dyn Mailer>,
    verification_url: String,
}

impl EmailValidationSender {
    /// Creates a sender linking to `verification_url`.
    pub fn new(mailer: Arc<dyn Mailer>, verification_url: impl Into<String>) -> Self {
        Self {
            mailer,
            verification_url: verification_url.into(),
        }
    }

    /// Builds the verification mail for a request.
    #[must_use]
    pub fn message(&self, request: &EmailValidationRequested) -> EmailMessage {
        let link = format!(
            "{}?account={}&token={}",
            self.verification_url, request.account_id, request.token
        );
        EmailMessage {
            to: request.email.clone(),
            subject: "Confirm your email address".to_owned(),
            body: format!("Open the following link to confirm your email address:\n\n{link}\n"),
        }
    }
}

#[async_trait]
impl DomainEventHandler<AccountEvent> for EmailValidationSender {
    fn name(&self) -> &'static str {
        "email_validation_sender"
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn process_domain_event(&self, event: &DomainEvent<AccountEvent>) -> Result<(), HandlerError> {
        let AccountEvent::ValidationRequested(request) = &event.body else {
            debug!("ignoring event");
            return Ok(());
        };
        self.mailer.send(&self.message(request)).await?;
        info!(account_id = %request.account_id, "verification mail sent");
        Ok(())
    }
}
