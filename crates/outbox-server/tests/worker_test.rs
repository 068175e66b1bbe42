//! Integration tests for the assembled worker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use outbox_accounts::application::command_handlers::handle_register_account;
use outbox_accounts::domain::commands::RegisterAccount;
use outbox_accounts::{AccountRepository, account_event_registry};
use outbox_core::clock::SystemClock;
use outbox_core::id::RandomIds;
use outbox_server::error::AppError;
use outbox_server::worker::Worker;
use outbox_test_support::{FlakyDocumentStore, MemoryDocumentStore};

use common::{RecordingMailer, VERIFICATION_URL, fast_config, start_worker};

#[tokio::test]
async fn test_registration_ends_in_one_verification_mail() {
    // Arrange
    let store = MemoryDocumentStore::new();
    let mailer = Arc::new(RecordingMailer::default());
    let worker = start_worker(&store, Arc::clone(&mailer)).await;
    let accounts = AccountRepository::new(Arc::new(store.clone()), Arc::new(account_event_registry()));

    // Act
    let account = handle_register_account(
        &RegisterAccount {
            email: "Ana@Example.com".to_owned(),
            display_name: "Ana".to_owned(),
        },
        &SystemClock,
        &RandomIds,
        &accounts,
    )
    .await
    .unwrap();
    let sent = mailer.wait_for(1, Duration::from_secs(2)).await;

    // Assert
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
    assert!(sent[0].body.contains(&format!("{VERIFICATION_URL}?account={}", account.id)));

    assert_eq!(mailer.wait_for(2, Duration::from_millis(200)).await.len(), 1);

    worker.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pending_backlog_is_mailed_after_restart() {
    // Arrange
    let store = MemoryDocumentStore::new();
    let accounts = AccountRepository::new(Arc::new(store.clone()), Arc::new(account_event_registry()));
    for n in 0..50 {
        handle_register_account(
            &RegisterAccount {
                email: format!("user{n}@example.com"),
                display_name: format!("User {n}"),
            },
            &SystemClock,
            &RandomIds,
            &accounts,
        )
        .await
        .unwrap();
    }
    let mailer = Arc::new(RecordingMailer::default());

    // Act
    let worker = start_worker(&store, Arc::clone(&mailer)).await;
    let sent = mailer.wait_for(50, Duration::from_secs(5)).await;

    // Assert
    assert_eq!(sent.len(), 50);
    let mut recipients: Vec<String> = sent.into_iter().map(|mail| mail.to).collect();
    recipients.sort();
    recipients.dedup();
    assert_eq!(recipients.len(), 50);
    worker.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_start_does_not_mail_again() {
    // Arrange
    let store = MemoryDocumentStore::new();
    let accounts = AccountRepository::new(Arc::new(store.clone()), Arc::new(account_event_registry()));
    let first_mailer = Arc::new(RecordingMailer::default());
    let first = start_worker(&store, Arc::clone(&first_mailer)).await;
    handle_register_account(
        &RegisterAccount {
            email: "ana@example.com".to_owned(),
            display_name: "Ana".to_owned(),
        },
        &SystemClock,
        &RandomIds,
        &accounts,
    )
    .await
    .unwrap();
    assert_eq!(first_mailer.wait_for(1, Duration::from_secs(2)).await.len(), 1);
    first.shutdown().await.unwrap();

    // Act
    let second_mailer = Arc::new(RecordingMailer::default());
    let second = start_worker(&store, Arc::clone(&second_mailer)).await;

    // Assert
    assert!(second_mailer.wait_for(1, Duration::from_millis(300)).await.is_empty());
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_fails_when_feed_is_unavailable() {
    let store = FlakyDocumentStore::shared(MemoryDocumentStore::new());
    store.fail_next_subscribes(1);

    let result = Worker::start(
        store,
        Arc::new(RecordingMailer::default()),
        VERIFICATION_URL,
        fast_config(),
    )
    .await;

    assert!(matches!(result, Err(AppError::Pump(_))));
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let store = MemoryDocumentStore::new();
    let worker = start_worker(&store, Arc::new(RecordingMailer::default())).await;

    worker.shutdown().await.unwrap();
    let again = worker.shutdown().await;

    assert!(again.is_ok());
    assert!(worker.pumps().iter().all(|pump| !pump.is_running()));
}
