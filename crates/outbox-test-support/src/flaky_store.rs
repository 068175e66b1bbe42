//! Failure-injecting `DocumentStore` wrapper.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use outbox_core::error::StoreError;
use outbox_core::store::{ChangeFilter, ChangeStream, Document, DocumentStore, Revision, Since};
use serde_json::Value;

/// Wraps a store and fails a configurable number of upcoming calls with a
/// connection error. Also counts calls per operation.
#[derive(Debug)]
pub struct FlakyDocumentStore<S> {
    inner: S,
    failing_inserts: AtomicUsize,
    failing_updates: AtomicUsize,
    failing_subscribes: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    subscribes: AtomicUsize,
}

impl<S: DocumentStore> FlakyDocumentStore<S> {
    /// Wraps `inner` with no failures scheduled.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_inserts: AtomicUsize::new(0),
            failing_updates: AtomicUsize::new(0),
            failing_subscribes: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            subscribes: AtomicUsize::new(0),
        }
    }

    /// Wraps `inner` in an `Arc` for sharing with pumps.
    pub fn shared(inner: S) -> Arc<Self> {
        Arc::new(Self::new(inner))
    }

    /// Fails the next `count` inserts.
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Fails the next `count` updates.
    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// Fails the next `count` subscribes.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    /// Number of insert calls seen, including failed ones.
    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Number of update calls seen, including failed ones.
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of subscribe calls seen, including failed ones.
    pub fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Decrements `counter` if positive; returns whether a failure was due.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected() -> StoreError {
    StoreError::Connection("connection refused".to_owned())
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FlakyDocumentStore<S> {
    async fn insert(&self, id: &str, body: Value) -> Result<Revision, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_inserts) {
            return Err(injected());
        }
        self.inner.insert(id, body).await
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.inner.get(id).await
    }

    async fn update(&self, id: &str, rev: &Revision, body: Value) -> Result<Revision, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_updates) {
            return Err(injected());
        }
        self.inner.update(id, rev, body).await
    }

    async fn subscribe(&self, filter: ChangeFilter, since: Since) -> Result<ChangeStream, StoreError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_subscribes) {
            return Err(injected());
        }
        self.inner.subscribe(filter, since).await
    }
}
