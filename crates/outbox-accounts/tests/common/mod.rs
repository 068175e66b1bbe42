//! Shared harness for end-to-end tests of the Accounts context.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use outbox_accounts::{
    AccountEvent, AccountRepository, EmailMessage, MailError, Mailer, account_event_registry,
};
use outbox_core::registry::EventRegistry;
use outbox_relay::{DocumentEventRepository, ExtractionPump, PumpConfig, PumpHandle};
use outbox_test_support::MemoryDocumentStore;

/// A mailer that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<EmailMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// An in-memory store with the account repository and event repository
/// wired over it.
pub struct Harness {
    pub store: MemoryDocumentStore,
    pub registry: Arc<EventRegistry<AccountEvent>>,
    pub accounts: AccountRepository,
    pub events: Arc<DocumentEventRepository<AccountEvent>>,
}

pub fn fast_config() -> PumpConfig {
    PumpConfig {
        handler_timeout: Duration::from_millis(500),
        reconnect_base_delay: Duration::from_millis(5),
        reconnect_max_delay: Duration::from_millis(50),
    }
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryDocumentStore::new();
        let registry = Arc::new(account_event_registry());
        let accounts = AccountRepository::new(Arc::new(store.clone()), Arc::clone(&registry));
        let events = Arc::new(DocumentEventRepository::new(
            Arc::new(store.clone()),
            Arc::clone(&registry),
            fast_config(),
        ));
        Self {
            store,
            registry,
            accounts,
            events,
        }
    }

    pub async fn start_extraction(&self) -> PumpHandle {
        ExtractionPump::new(
            Arc::new(self.store.clone()),
            self.events.clone(),
            Arc::clone(&self.registry),
            fast_config(),
        )
        .start()
        .await
        .unwrap()
    }

    /// Polls until `count` domain event documents exist or `timeout` passes.
    pub async fn wait_for_event_documents(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let ids = self.store.ids_with_prefix("domain_event:");
            if ids.len() >= count || tokio::time::Instant::now() >= deadline {
                return ids;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
