//! Worker error types.

use outbox_core::error::{ConfigError, StoreError};
use outbox_relay::PumpError;
use thiserror::Error;

/// Startup and runtime errors for the worker.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CouchDB connection or bootstrap failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A pump failed to start or stop.
    #[error("pump error: {0}")]
    Pump(#[from] PumpError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failing_layer() {
        let config = AppError::from(ConfigError::Missing("COUCHDB_URL"));
        let store = AppError::from(StoreError::Connection("refused".to_owned()));

        assert!(config.to_string().starts_with("configuration error"));
        assert!(config.to_string().contains("COUCHDB_URL"));
        assert_eq!(store.to_string(), "store error: connection error: refused");
    }
}
