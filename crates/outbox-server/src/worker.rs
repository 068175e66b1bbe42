//! Wires the account context onto the relay pumps.

use std::sync::Arc;

use outbox_accounts::{AccountEvent, EmailValidationSender, Mailer, account_event_registry};
use outbox_core::clock::SystemClock;
use outbox_core::store::DocumentStore;
use outbox_relay::{DocumentEventRepository, ExtractionPump, MessagePump, PumpConfig, PumpHandle};
use tracing::info;

use crate::error::AppError;

/// The running extraction and message pumps.
#[derive(Debug)]
pub struct Worker {
    extraction: PumpHandle,
    delivery: PumpHandle,
}

impl Worker {
    /// Starts a message pump that mails verification links through
    /// `mailer`, then the extraction pump.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pump` if either feed subscription fails. A pump
    /// that already started is stopped again.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        verification_url: &str,
        config: PumpConfig,
    ) -> Result<Self, AppError> {
        let registry = Arc::new(account_event_registry());
        let events = Arc::new(DocumentEventRepository::<AccountEvent>::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            config.clone(),
        ));

        // Delivery replays every unpublished event, including those the
        // extraction pump moves out of the backlog.
        let sender = Arc::new(EmailValidationSender::new(mailer, verification_url));
        let delivery = MessagePump::new(
            events.clone(),
            sender,
            Arc::new(SystemClock),
            config.clone(),
        )
        .start()
        .await?;

        let extraction = match ExtractionPump::new(store, events, registry, config).start().await {
            Ok(handle) => handle,
            Err(err) => {
                delivery.shutdown().await?;
                return Err(err.into());
            }
        };

        info!("worker started");
        Ok(Self {
            extraction,
            delivery,
        })
    }

    /// Both pump handles.
    #[must_use]
    pub fn pumps(&self) -> [&PumpHandle; 2] {
        [&self.extraction, &self.delivery]
    }

    /// Stops delivery first, then extraction, waiting for each.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pump` if a pump task panicked.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.delivery.shutdown().await?;
        self.extraction.shutdown().await?;
        info!("worker stopped");
        Ok(())
    }
}
