//! Pump lifecycle handle.

use std::sync::{Mutex, PoisonError};

use outbox_core::error::RepositoryError;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Errors from starting or stopping a pump.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The initial feed subscription failed; the pump never started.
    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] RepositoryError),

    /// The pump task panicked.
    #[error("pump task panicked: {0}")]
    Panicked(String),
}

/// Handle to a running pump task.
///
/// Dropping the handle closes the shutdown channel, which also stops the
/// pump; call [`shutdown`](PumpHandle::shutdown) to wait for it.
#[derive(Debug)]
pub struct PumpHandle {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PumpHandle {
    pub(crate) fn new(
        name: &'static str,
        shutdown_tx: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// The pump's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` while the pump task has not exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Signals the pump to stop, then waits for its in-flight work to
    /// finish. Calling it again returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `PumpError::Panicked` if the task panicked.
    pub async fn shutdown(&self) -> Result<(), PumpError> {
        // The receiver may already be gone if the task exited.
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.await
                .map_err(|e| PumpError::Panicked(e.to_string()))?;
            info!(pump = self.name, "pump stopped");
        }
        Ok(())
    }
}

/// Resolves once shutdown is requested or the handle is dropped.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
