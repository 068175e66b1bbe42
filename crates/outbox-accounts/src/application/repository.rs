//! Account persistence.
//!
//! Each account is one `account:{id}` document carrying its pending events.
//! A second `account_email:{email}` document maps the normalized email to
//! the account id and makes email addresses unique.

use std::sync::Arc;

use outbox_core::aggregate::Aggregate;
use outbox_core::error::{RepositoryError, StoreError};
use outbox_core::registry::EventRegistry;
use outbox_core::store::DocumentStore;
use outbox_relay::{AggregateWriter, SecondaryDocument};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::aggregates::{Account, AccountWithEvents, account_document_id};
use crate::domain::email::normalize_email;
use crate::domain::events::AccountEvent;
use crate::error::AccountError;

/// Prefix of email index document ids.
pub const EMAIL_INDEX_PREFIX: &str = "account_email:";

/// Returns the index document id for a normalized email address.
#[must_use]
pub fn email_index_id(email: &str) -> String {
    format!("{EMAIL_INDEX_PREFIX}{email}")
}

#[derive(Debug, Serialize, Deserialize)]
struct EmailIndex {
    account_id: String,
}

/// Reads and writes accounts.
pub struct AccountRepository {
    writer: AggregateWriter<AccountEvent>,
}

impl AccountRepository {
    /// Creates a repository over `store`.
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<EventRegistry<AccountEvent>>) -> Self {
        Self {
            writer: AggregateWriter::new(store, registry),
        }
    }

    /// Inserts a new account with its pending events, then its email index.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::AlreadyExists` if the email is taken, or
    /// `AccountError::Repository` for other failures.
    #[instrument(skip(self, envelope), fields(account_id = %envelope.aggregate().id))]
    pub async fn insert(&self, envelope: AccountWithEvents) -> Result<Account, AccountError> {
        let email = envelope.aggregate().email.clone();
        let index_id = email_index_id(&email);
        let index = SecondaryDocument {
            id: index_id.clone(),
            body: serde_json::to_value(EmailIndex {
                account_id: envelope.aggregate().id.clone(),
            })
            .map_err(|e| RepositoryError::Store(e.into()))?,
        };

        match self.writer.insert(envelope, &[index]).await {
            Ok(account) => {
                info!(account_id = %account.id, "account stored");
                Ok(account)
            }
            Err(RepositoryError::Store(StoreError::Conflict { id })) if id == index_id => {
                Err(AccountError::AlreadyExists { email })
            }
            Err(RepositoryError::Store(StoreError::Conflict { id })) => Err(AccountError::Conflict { id }),
            Err(err) => Err(err.into()),
        }
    }

    /// Loads an account with the events still pending on it.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` if there is no such account.
    pub async fn load(&self, account_id: &str) -> Result<AccountWithEvents, AccountError> {
        self.writer
            .load(&account_document_id(account_id))
            .await
            .map_err(|err| not_found_as(err, account_id))
    }

    /// Writes an account back at the revision it was loaded at.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Conflict` if the account changed since it was
    /// loaded.
    #[instrument(skip(self, envelope), fields(account_id = %envelope.aggregate().id))]
    pub async fn update(&self, envelope: AccountWithEvents) -> Result<Account, AccountError> {
        let account_id = envelope.aggregate().id.clone();
        self.writer.update(envelope).await.map_err(|err| {
            if err.is_conflict() {
                AccountError::Conflict { id: account_id }
            } else {
                err.into()
            }
        })
    }

    /// Reads an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` if there is no such account.
    pub async fn get(&self, account_id: &str) -> Result<Account, AccountError> {
        let document = self
            .writer
            .store()
            .get(&account_document_id(account_id))
            .await
            .map_err(|err| not_found_as(err.into(), account_id))?;
        Account::from_document(&document).map_err(|err| AccountError::Repository(err.into()))
    }

    /// Looks an account up by email address through the index.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for a malformed address.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountError> {
        let email = normalize_email(email)?;
        let index = match self.writer.store().get(&email_index_id(&email)).await {
            Ok(document) => document,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(AccountError::Repository(err.into())),
        };
        let EmailIndex { account_id } = index
            .decode()
            .map_err(|err| AccountError::Repository(err.into()))?;

        match self.get(&account_id).await {
            Ok(account) => Ok(Some(account)),
            Err(AccountError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn not_found_as(err: RepositoryError, account_id: &str) -> AccountError {
    match err {
        RepositoryError::Store(StoreError::NotFound { .. }) => AccountError::NotFound {
            id: account_id.to_owned(),
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use outbox_core::aggregate::WithEvents;
    use outbox_test_support::{FixedClock, MemoryDocumentStore, SequenceIds};

    use super::*;
    use crate::domain::events::account_event_registry;

    fn repository(store: &MemoryDocumentStore) -> AccountRepository {
        AccountRepository::new(Arc::new(store.clone()), Arc::new(account_event_registry()))
    }

    fn ana(ids: &SequenceIds) -> AccountWithEvents {
        Account::register(
            "ana@example.com".to_owned(),
            "Ana".to_owned(),
            &FixedClock::standard(),
            ids,
        )
    }

    #[tokio::test]
    async fn test_insert_writes_account_with_events_and_index() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let repo = repository(&store);

        // Act
        let account = repo.insert(ana(&SequenceIds::new("a"))).await.unwrap();

        // Assert
        assert!(account.revision().is_some());
        let body = store.body("account:a-1").unwrap();
        assert_eq!(body["email"], "ana@example.com");
        assert_eq!(body["events"].as_array().unwrap().len(), 2);
        assert_eq!(
            store.body("account_email:ana@example.com").unwrap()["account_id"],
            "a-1"
        );
    }

    #[tokio::test]
    async fn test_insert_with_taken_email_is_already_exists() {
        let store = MemoryDocumentStore::new();
        let repo = repository(&store);
        repo.insert(ana(&SequenceIds::new("a"))).await.unwrap();

        let result = repo.insert(ana(&SequenceIds::new("b"))).await;

        assert!(matches!(
            result,
            Err(AccountError::AlreadyExists { email }) if email == "ana@example.com"
        ));
    }

    #[tokio::test]
    async fn test_update_with_stale_revision_is_conflict() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let repo = repository(&store);
        repo.insert(ana(&SequenceIds::new("a"))).await.unwrap();
        let first = repo.load("a-1").await.unwrap();
        let mut second = repo.load("a-1").await.unwrap();
        second.aggregate_mut().display_name = "Ana B.".to_owned();
        repo.update(second).await.unwrap();

        // Act
        let result = repo.update(first).await;

        // Assert
        assert!(matches!(result, Err(AccountError::Conflict { id }) if id == "a-1"));
    }

    #[tokio::test]
    async fn test_get_and_load_missing_account_are_not_found() {
        let store = MemoryDocumentStore::new();
        let repo = repository(&store);

        let got = repo.get("ghost").await;
        let loaded = repo.load("ghost").await;

        assert!(matches!(got, Err(AccountError::NotFound { id }) if id == "ghost"));
        assert!(matches!(loaded, Err(AccountError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_find_by_email_normalizes_and_follows_index() {
        let store = MemoryDocumentStore::new();
        let repo = repository(&store);
        repo.insert(ana(&SequenceIds::new("a"))).await.unwrap();

        let found = repo.find_by_email(" ANA@example.com").await.unwrap();
        let missing = repo.find_by_email("bob@example.com").await.unwrap();

        assert_eq!(found.map(|a| a.id), Some("a-1".to_owned()));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_without_events_keeps_document_free_of_events_field() {
        let store = MemoryDocumentStore::new();
        let repo = repository(&store);
        let inserted = repo
            .insert(WithEvents::of(ana(&SequenceIds::new("a")).into_parts().0))
            .await
            .unwrap();

        repo.update(WithEvents::of(inserted)).await.unwrap();

        assert!(store.body("account:a-1").unwrap().get("events").is_none());
    }
}
