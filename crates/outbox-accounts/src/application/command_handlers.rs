//! Command handlers for the Accounts context.
//!
//! Each handler loads or creates the aggregate, runs the domain operation,
//! and persists the account together with the events it produced.

use outbox_core::aggregate::Aggregate;
use outbox_core::clock::Clock;
use outbox_core::id::IdGenerator;
use tracing::{info, instrument};

use super::repository::AccountRepository;
use crate::domain::aggregates::Account;
use crate::domain::commands::{RegisterAccount, ValidateEmail};
use crate::domain::email::normalize_email;
use crate::error::AccountError;

/// Handles the `RegisterAccount` command: validates the input, creates the
/// account and persists it with its registration events.
///
/// # Errors
///
/// Returns `AccountError::Validation` for bad input,
/// `AccountError::AlreadyExists` if the email is taken, or a repository
/// error.
#[instrument(skip(command, clock, ids, repo))]
pub async fn handle_register_account(
    command: &RegisterAccount,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    repo: &AccountRepository,
) -> Result<Account, AccountError> {
    let email = normalize_email(&command.email)?;
    let display_name = command.display_name.trim();
    if display_name.is_empty() {
        return Err(AccountError::Validation("display name must not be empty".to_owned()));
    }

    let envelope = Account::register(email, display_name.to_owned(), clock, ids);
    let account = repo.insert(envelope).await?;
    info!(account_id = %account.id, "account registered");
    Ok(account)
}

/// Handles the `ValidateEmail` command: checks the token and persists the
/// validated account with an `EmailValidated` event.
///
/// # Errors
///
/// Returns `AccountError::NotFound`, `AccountError::InvalidToken`,
/// `AccountError::Validation` if already validated, or
/// `AccountError::Conflict` if the account changed since `expected_rev`
/// or during the update.
#[instrument(skip(command, clock, ids, repo), fields(account_id = %command.account_id))]
pub async fn handle_validate_email(
    command: &ValidateEmail,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    repo: &AccountRepository,
) -> Result<Account, AccountError> {
    let mut envelope = repo.load(&command.account_id).await?;
    if let Some(expected) = &command.expected_rev {
        if envelope.aggregate().revision() != Some(expected) {
            return Err(AccountError::Conflict {
                id: command.account_id.clone(),
            });
        }
    }

    Account::validate_email(&mut envelope, &command.token, clock, ids)?;
    let account = repo.update(envelope).await?;
    info!("email validated");
    Ok(account)
}
