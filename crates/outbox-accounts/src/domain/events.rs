//! Domain events for the Accounts context.

use outbox_core::event::EventBody;
use outbox_core::registry::EventRegistry;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emitted when an account is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRegistered {
    /// The new account's id.
    pub account_id: String,
    /// Normalized email address.
    pub email: String,
    /// Name shown to other users.
    pub display_name: String,
}

/// Emitted when an email address needs to be confirmed by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailValidationRequested {
    /// The account to validate.
    pub account_id: String,
    /// Address the verification mail goes to.
    pub email: String,
    /// Secret the owner presents back.
    pub token: String,
}

/// Emitted when the owner confirmed their email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailValidated {
    /// The validated account.
    pub account_id: String,
}

/// Event payload variants for the Accounts context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    /// An account was created.
    Registered(AccountRegistered),
    /// A verification mail should be sent.
    ValidationRequested(EmailValidationRequested),
    /// The email address was confirmed.
    Validated(EmailValidated),
}

impl EventBody for AccountEvent {
    const KINDS: &'static [&'static str] =
        &["AccountRegistered", "EmailValidationRequested", "EmailValidated"];

    fn kind(&self) -> &'static str {
        match self {
            Self::Registered(_) => "AccountRegistered",
            Self::ValidationRequested(_) => "EmailValidationRequested",
            Self::Validated(_) => "EmailValidated",
        }
    }

    fn encode(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Registered(payload) => serde_json::to_value(payload),
            Self::ValidationRequested(payload) => serde_json::to_value(payload),
            Self::Validated(payload) => serde_json::to_value(payload),
        }
    }

    fn decode(kind: &'static str, body: Value) -> Result<Self, serde_json::Error> {
        match kind {
            "AccountRegistered" => serde_json::from_value(body).map(Self::Registered),
            "EmailValidationRequested" => serde_json::from_value(body).map(Self::ValidationRequested),
            "EmailValidated" => serde_json::from_value(body).map(Self::Validated),
            other => Err(serde_json::Error::custom(format!("unknown account event kind {other}"))),
        }
    }
}

/// Builds the registry mapping account events to their wire names.
///
/// Call once at startup and share the result.
#[must_use]
pub fn account_event_registry() -> EventRegistry<AccountEvent> {
    EventRegistry::new()
        .register("AccountRegistered", "account_registered")
        .register("EmailValidationRequested", "email_validation_requested")
        .register("EmailValidated", "email_validated")
}
