//! Commands for the Accounts context.

use outbox_core::store::Revision;

/// Command to register a new account.
#[derive(Debug, Clone)]
pub struct RegisterAccount {
    /// Email address as entered. Normalized before use.
    pub email: String,
    /// Name shown to other users.
    pub display_name: String,
}

/// Command to confirm an account's email address.
#[derive(Debug, Clone)]
pub struct ValidateEmail {
    /// The account to validate.
    pub account_id: String,
    /// Token from the verification mail.
    pub token: String,
    /// Revision the caller last saw. When set, the command fails with a
    /// conflict if the account has changed since.
    pub expected_rev: Option<Revision>,
}
