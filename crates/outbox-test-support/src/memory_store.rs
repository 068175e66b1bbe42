//! In-memory `DocumentStore` with a change feed.
//!
//! Mirrors the store semantics the outbox relies on: per-document
//! revisions, conflicts on duplicate insert and stale update, `_id`/`_rev`
//! injected on read, and a sequenced change feed that can replay from the
//! beginning or resume after a position.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use outbox_core::error::StoreError;
use outbox_core::store::{
    Change, ChangeFilter, ChangeStream, Document, DocumentStore, Revision, Since, strip_metadata,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Capacity of the live change channel.
const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    id: String,
    rev: Revision,
    body: Value,
}

impl Entry {
    fn document(&self) -> Document {
        let mut body = self.body.clone();
        if let Some(object) = body.as_object_mut() {
            object.insert("_id".to_owned(), Value::String(self.id.clone()));
            object.insert("_rev".to_owned(), Value::String(self.rev.to_string()));
        }
        Document {
            id: self.id.clone(),
            rev: self.rev.clone(),
            body,
        }
    }

    fn change(&self) -> Change {
        Change {
            seq: self.seq.to_string(),
            document: self.document(),
        }
    }
}

#[derive(Debug, Clone)]
enum FeedItem {
    Changed(Entry),
    Disconnect,
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<String, Entry>,
    next_seq: u64,
}

/// Thread-safe in-memory document store. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
    feed: broadcast::Sender<FeedItem>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            feed,
        }
    }

    /// Returns the stored body of `id` (without metadata), if present.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn body(&self, id: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(id)
            .map(|entry| entry.body.clone())
    }

    /// Returns the ids of all documents starting with `prefix`, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .lock()
            .unwrap()
            .documents
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Breaks every open change feed with a connection error, as a dropped
    /// HTTP stream would.
    pub fn disconnect_feeds(&self) {
        let _ = self.feed.send(FeedItem::Disconnect);
    }

    fn write(inner: &mut Inner, id: &str, previous: Option<&Revision>, mut body: Value) -> Entry {
        strip_metadata(&mut body);
        inner.next_seq += 1;
        Entry {
            seq: inner.next_seq,
            id: id.to_owned(),
            rev: next_revision(previous, &body),
            body,
        }
    }

    fn publish(&self, entry: &Entry) {
        // No receivers is fine; the write is already durable.
        let _ = self.feed.send(FeedItem::Changed(entry.clone()));
    }
}

/// Computes a CouchDB-style `N-hash` revision.
fn next_revision(previous: Option<&Revision>, body: &Value) -> Revision {
    let generation = previous
        .and_then(|rev| rev.as_str().split_once('-'))
        .and_then(|(generation, _)| generation.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    let digest = Sha256::digest(body.to_string().as_bytes());
    let hash: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    Revision::from(format!("{generation}-{hash}"))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, id: &str, body: Value) -> Result<Revision, StoreError> {
        let entry = {
            let mut inner = self.inner.lock().unwrap();
            if inner.documents.contains_key(id) {
                return Err(StoreError::Conflict { id: id.to_owned() });
            }
            let entry = Self::write(&mut inner, id, None, body);
            inner.documents.insert(id.to_owned(), entry.clone());
            self.publish(&entry);
            entry
        };
        Ok(entry.rev)
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(id)
            .map(Entry::document)
            .ok_or_else(|| StoreError::NotFound { id: id.to_owned() })
    }

    async fn update(&self, id: &str, rev: &Revision, body: Value) -> Result<Revision, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .documents
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_owned() })?;
        if &current.rev != rev {
            return Err(StoreError::Conflict { id: id.to_owned() });
        }
        let previous = current.rev.clone();
        let entry = Self::write(&mut inner, id, Some(&previous), body);
        inner.documents.insert(id.to_owned(), entry.clone());
        self.publish(&entry);
        Ok(entry.rev)
    }

    async fn subscribe(&self, filter: ChangeFilter, since: Since) -> Result<ChangeStream, StoreError> {
        let after = match &since {
            Since::Beginning => Some(0),
            Since::Now => None,
            Since::After(seq) => Some(seq.parse::<u64>().map_err(|_| {
                StoreError::Request(format!("invalid feed position {seq:?}"))
            })?),
        };

        // Snapshot and subscribe under one lock so no write falls between.
        let (backlog, receiver) = {
            let inner = self.inner.lock().unwrap();
            let mut backlog: Vec<Entry> = match after {
                Some(after) => inner
                    .documents
                    .values()
                    .filter(|entry| entry.seq > after && filter.matches(&entry.id, &entry.body))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            backlog.sort_by_key(|entry| entry.seq);
            (backlog, self.feed.subscribe())
        };

        let replay = futures::stream::iter(backlog.into_iter().map(|entry| Ok(entry.change())));
        let live = BroadcastStream::new(receiver).filter_map(move |item| {
            let delivered = match item {
                Ok(FeedItem::Changed(entry)) if filter.matches(&entry.id, &entry.body) => {
                    Some(Ok(entry.change()))
                }
                Ok(FeedItem::Changed(_)) => None,
                Ok(FeedItem::Disconnect) => {
                    Some(Err(StoreError::Connection("change feed disconnected".to_owned())))
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => Some(Err(
                    StoreError::Connection(format!("change feed lagged by {skipped} changes")),
                )),
            };
            futures::future::ready(delivered)
        });

        Ok(Box::pin(replay.chain(live)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    async fn next_change(stream: &mut ChangeStream) -> Change {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for change")
            .expect("feed ended")
            .expect("feed error")
    }

    #[tokio::test]
    async fn test_insert_then_get_returns_body_with_metadata() {
        let store = MemoryDocumentStore::new();

        let rev = store.insert("a", json!({ "n": 1 })).await.unwrap();
        let document = store.get("a").await.unwrap();

        assert_eq!(document.rev, rev);
        assert_eq!(document.body["n"], 1);
        assert_eq!(document.body["_id"], "a");
        assert_eq!(document.body["_rev"], rev.as_str());
        assert!(rev.as_str().starts_with("1-"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = MemoryDocumentStore::new();
        store.insert("a", json!({})).await.unwrap();

        let result = store.insert("a", json!({})).await;

        assert_eq!(result, Err(StoreError::Conflict { id: "a".into() }));
    }

    #[tokio::test]
    async fn test_update_with_stale_revision_conflicts() {
        // Arrange
        let store = MemoryDocumentStore::new();
        let first = store.insert("a", json!({ "n": 1 })).await.unwrap();
        let second = store.update("a", &first, json!({ "n": 2 })).await.unwrap();

        // Act
        let stale = store.update("a", &first, json!({ "n": 3 })).await;
        let fresh = store.update("a", &second, json!({ "n": 3 })).await;

        // Assert
        assert_eq!(stale, Err(StoreError::Conflict { id: "a".into() }));
        let third = fresh.unwrap();
        assert_ne!(third, second);
        assert!(third.as_str().starts_with("3-"));
    }

    #[tokio::test]
    async fn test_get_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();

        let result = store.get("missing").await;

        assert_eq!(result, Err(StoreError::NotFound { id: "missing".into() }));
    }

    #[tokio::test]
    async fn test_subscribe_from_beginning_replays_matching_documents_then_follows() {
        // Arrange
        let store = MemoryDocumentStore::new();
        store.insert("domain_event:1", json!({})).await.unwrap();
        store.insert("account:1", json!({})).await.unwrap();
        let mut feed = store
            .subscribe(ChangeFilter::DomainEvents, Since::Beginning)
            .await
            .unwrap();

        // Act
        store.insert("domain_event:2", json!({})).await.unwrap();

        // Assert
        assert_eq!(next_change(&mut feed).await.document.id, "domain_event:1");
        assert_eq!(next_change(&mut feed).await.document.id, "domain_event:2");
    }

    #[tokio::test]
    async fn test_subscribe_after_position_skips_earlier_changes() {
        let store = MemoryDocumentStore::new();
        store.insert("domain_event:1", json!({})).await.unwrap();
        let mut feed = store
            .subscribe(ChangeFilter::DomainEvents, Since::Beginning)
            .await
            .unwrap();
        let first = next_change(&mut feed).await;
        store.insert("domain_event:2", json!({})).await.unwrap();

        let mut resumed = store
            .subscribe(ChangeFilter::DomainEvents, Since::After(first.seq))
            .await
            .unwrap();

        assert_eq!(next_change(&mut resumed).await.document.id, "domain_event:2");
    }

    #[tokio::test]
    async fn test_disconnect_surfaces_connection_error() {
        let store = MemoryDocumentStore::new();
        let mut feed = store
            .subscribe(ChangeFilter::DomainEvents, Since::Now)
            .await
            .unwrap();

        store.disconnect_feeds();

        let item = feed.next().await.unwrap();
        assert!(matches!(item, Err(StoreError::Connection(_))));
    }
}
