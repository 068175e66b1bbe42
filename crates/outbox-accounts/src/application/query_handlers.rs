//! Query handlers for the Accounts context.

use chrono::{DateTime, Utc};
use outbox_core::aggregate::Aggregate;
use serde::Serialize;

use super::repository::AccountRepository;
use crate::domain::aggregates::Account;
use crate::error::AccountError;

/// Read-only view of an account. Never exposes the validation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    /// The account identifier.
    pub account_id: String,
    /// Normalized email address.
    pub email: String,
    /// Name shown to other users.
    pub display_name: String,
    /// Whether the email address was confirmed.
    pub email_validated: bool,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
    /// Current storage revision, for optimistic updates.
    pub revision: Option<String>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        let revision = account.revision().map(ToString::to_string);
        Self {
            account_id: account.id,
            email: account.email,
            display_name: account.display_name,
            email_validated: account.email_validated,
            created_at: account.created_at,
            revision,
        }
    }
}

/// Retrieves an account by id.
///
/// # Errors
///
/// Returns `AccountError::NotFound` if there is no such account.
pub async fn get_account(account_id: &str, repo: &AccountRepository) -> Result<AccountView, AccountError> {
    repo.get(account_id).await.map(AccountView::from)
}

/// Retrieves an account by email address.
///
/// # Errors
///
/// Returns `AccountError::Validation` for a malformed address.
pub async fn find_account_by_email(
    email: &str,
    repo: &AccountRepository,
) -> Result<Option<AccountView>, AccountError> {
    Ok(repo.find_by_email(email).await?.map(AccountView::from))
}
