//! Shared test helpers for worker integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use outbox_accounts::{EmailMessage, MailError, Mailer};
use outbox_relay::PumpConfig;
use outbox_server::state::AppState;
use outbox_server::worker::Worker;
use outbox_test_support::MemoryDocumentStore;
use tower::ServiceExt;

pub const VERIFICATION_URL: &str = "http://localhost:3000/accounts/verify";

/// A mailer that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<EmailMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent.lock().unwrap().clone();
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

pub fn fast_config() -> PumpConfig {
    PumpConfig {
        handler_timeout: Duration::from_millis(500),
        reconnect_base_delay: Duration::from_millis(5),
        reconnect_max_delay: Duration::from_millis(50),
    }
}

/// Starts a worker over an in-memory store.
pub async fn start_worker(store: &MemoryDocumentStore, mailer: Arc<RecordingMailer>) -> Arc<Worker> {
    let worker = Worker::start(
        Arc::new(store.clone()),
        mailer,
        VERIFICATION_URL,
        fast_config(),
    )
    .await
    .unwrap();
    Arc::new(worker)
}

/// Build the app router around a running worker. Uses the same route
/// structure as `main.rs`.
pub fn build_test_app(worker: Arc<Worker>) -> Router {
    outbox_server::app(AppState::new(worker))
}

/// Send a GET request and return the status and JSON body.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
