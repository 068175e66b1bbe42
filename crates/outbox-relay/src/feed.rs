//! Resumable change-feed subscriptions.
//!
//! Wraps a store subscription so that a dropped or failed feed is
//! resubscribed with backoff from the last delivered position. Consumers see
//! a single endless stream of changes.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use outbox_core::error::StoreError;
use outbox_core::store::{Change, ChangeFilter, ChangeStream, DocumentStore, Since};
use tracing::{info, warn};

use crate::config::PumpConfig;

/// Endless stream of changes. Dropping it unsubscribes.
pub type ResumableChanges = Pin<Box<dyn Stream<Item = Change> + Send>>;

struct FeedState {
    store: Arc<dyn DocumentStore>,
    filter: ChangeFilter,
    position: Since,
    current: Option<ChangeStream>,
    failures: u32,
    config: PumpConfig,
}

/// Subscribes to `filter` starting at `since`.
///
/// The first subscription happens before this returns, so its failure is
/// reported to the caller. Later failures are logged and retried.
///
/// # Errors
///
/// Returns the store error of the initial subscribe.
pub async fn resumable_changes(
    store: Arc<dyn DocumentStore>,
    filter: ChangeFilter,
    since: Since,
    config: PumpConfig,
) -> Result<ResumableChanges, StoreError> {
    let initial = store.subscribe(filter, since.clone()).await?;
    let state = FeedState {
        store,
        filter,
        position: since,
        current: Some(initial),
        failures: 0,
        config,
    };
    Ok(Box::pin(futures::stream::unfold(state, next_change)))
}

async fn next_change(mut state: FeedState) -> Option<(Change, FeedState)> {
    loop {
        if let Some(stream) = state.current.as_mut() {
            let next = stream.next().await;
            match next {
                Some(Ok(change)) => {
                    state.failures = 0;
                    state.position = Since::After(change.seq.clone());
                    return Some((change, state));
                }
                Some(Err(err)) => {
                    warn!(filter = state.filter.name(), error = %err, "change feed interrupted");
                    state.current = None;
                }
                None => {
                    warn!(filter = state.filter.name(), "change feed ended");
                    state.current = None;
                }
            }
        } else {
            let delay = state.config.reconnect_delay(state.failures);
            tokio::time::sleep(delay).await;
            match state.store.subscribe(state.filter, state.position.clone()).await {
                Ok(stream) => {
                    info!(filter = state.filter.name(), position = ?state.position, "change feed resubscribed");
                    state.current = Some(stream);
                }
                Err(err) => {
                    state.failures = state.failures.saturating_add(1);
                    warn!(
                        filter = state.filter.name(),
                        error = %err,
                        failures = state.failures,
                        "change feed resubscribe failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use outbox_test_support::{FlakyDocumentStore, MemoryDocumentStore};
    use serde_json::json;

    use super::*;

    fn fast() -> PumpConfig {
        PumpConfig {
            reconnect_base_delay: Duration::from_millis(5),
            reconnect_max_delay: Duration::from_millis(20),
            ..PumpConfig::default()
        }
    }

    async fn next(changes: &mut ResumableChanges) -> Change {
        tokio::time::timeout(Duration::from_secs(2), changes.next())
            .await
            .expect("timed out waiting for change")
            .expect("resumable feed never ends")
    }

    #[tokio::test]
    async fn test_initial_subscribe_failure_is_returned() {
        let store = FlakyDocumentStore::shared(MemoryDocumentStore::new());
        store.fail_next_subscribes(1);

        let result =
            resumable_changes(store, ChangeFilter::DomainEvents, Since::Now, fast()).await;

        assert!(matches!(result, Err(StoreError::Connection(_))));
    }

    #[tokio::test]
    async fn test_feed_resumes_after_disconnect_without_replaying() {
        // Arrange
        let memory = MemoryDocumentStore::new();
        let store = FlakyDocumentStore::shared(memory.clone());
        let mut changes = resumable_changes(
            store.clone(),
            ChangeFilter::DomainEvents,
            Since::Beginning,
            fast(),
        )
        .await
        .unwrap();
        memory.insert("domain_event:1", json!({})).await.unwrap();
        assert_eq!(next(&mut changes).await.document.id, "domain_event:1");

        // Act
        store.fail_next_subscribes(2);
        memory.disconnect_feeds();
        memory.insert("domain_event:2", json!({})).await.unwrap();

        // Assert
        assert_eq!(next(&mut changes).await.document.id, "domain_event:2");
        assert_eq!(store.subscribe_calls(), 4);
    }
}
