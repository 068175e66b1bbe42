//! Aggregate roots for the Accounts context.

use chrono::{DateTime, Utc};
use outbox_core::aggregate::{Aggregate, WithEvents};
use outbox_core::clock::Clock;
use outbox_core::event::DomainEvent;
use outbox_core::id::IdGenerator;
use outbox_core::store::Revision;
use serde::{Deserialize, Serialize};

use super::events::{AccountEvent, AccountRegistered, EmailValidated, EmailValidationRequested};
use crate::error::AccountError;

/// Prefix of account document ids.
pub const ACCOUNT_DOCUMENT_PREFIX: &str = "account:";

/// Returns the document id for an account.
#[must_use]
pub fn account_document_id(account_id: &str) -> String {
    format!("{ACCOUNT_DOCUMENT_PREFIX}{account_id}")
}

/// An account together with the events pending on its next write.
pub type AccountWithEvents = WithEvents<Account, AccountEvent>;

/// The aggregate root for a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Aggregate identifier.
    pub id: String,
    /// Normalized email address.
    pub email: String,
    /// Name shown to other users.
    pub display_name: String,
    /// Whether the owner confirmed the email address.
    pub email_validated: bool,
    /// Outstanding validation secret. Cleared once validated.
    pub validation_token: Option<String>,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    rev: Option<Revision>,
}

impl Account {
    /// Creates an unvalidated account and the events announcing it: an
    /// `AccountRegistered` followed by an `EmailValidationRequested`.
    ///
    /// `email` must already be normalized.
    pub fn register(
        email: String,
        display_name: String,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> AccountWithEvents {
        let account = Self {
            id: ids.next_id(),
            email,
            display_name,
            email_validated: false,
            validation_token: Some(ids.next_id()),
            created_at: clock.now(),
            rev: None,
        };

        let registered = AccountEvent::Registered(AccountRegistered {
            account_id: account.id.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
        });
        let requested = AccountEvent::ValidationRequested(EmailValidationRequested {
            account_id: account.id.clone(),
            email: account.email.clone(),
            token: account.validation_token.clone().unwrap_or_default(),
        });

        let mut envelope = WithEvents::of(account);
        envelope.add_event(DomainEvent::new(registered, clock, ids));
        envelope.add_event(DomainEvent::new(requested, clock, ids));
        envelope
    }

    /// Marks the email address validated if `token` matches, producing an
    /// `EmailValidated` event.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` if the address was already
    /// validated, or `AccountError::InvalidToken` on a mismatch.
    pub fn validate_email(
        envelope: &mut AccountWithEvents,
        token: &str,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> Result<(), AccountError> {
        let account = envelope.aggregate_mut();
        if account.email_validated {
            return Err(AccountError::Validation(format!(
                "email of account {} is already validated",
                account.id
            )));
        }
        if account.validation_token.as_deref() != Some(token) {
            return Err(AccountError::InvalidToken);
        }

        account.email_validated = true;
        account.validation_token = None;
        let validated = AccountEvent::Validated(EmailValidated {
            account_id: account.id.clone(),
        });
        envelope.add_event(DomainEvent::new(validated, clock, ids));
        Ok(())
    }
}

impl Aggregate for Account {
    fn document_id(&self) -> String {
        account_document_id(&self.id)
    }

    fn revision(&self) -> Option<&Revision> {
        self.rev.as_ref()
    }

    fn set_revision(&mut self, rev: Revision) {
        self.rev = Some(rev);
    }
}
