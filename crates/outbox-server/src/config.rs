//! Worker configuration.

use std::net::SocketAddr;

use outbox_core::config::env_lookup;
use outbox_core::error::ConfigError;
use outbox_couchdb::CouchConfig;
use outbox_relay::PumpConfig;

/// Default link target for verification mails.
pub const DEFAULT_VERIFICATION_URL: &str = "http://localhost:3000/accounts/verify";

/// HTTP listener and mail settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Base URL of the verification link sent to new accounts.
    pub verification_url: String,
}

impl ServerConfig {
    /// Reads `HOST` (default `0.0.0.0`), `PORT` (default `3000`) and
    /// `VERIFICATION_URL` from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `PORT` is not a valid port.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("PORT", &raw, e))?,
            None => 3000,
        };
        let verification_url =
            lookup("VERIFICATION_URL").unwrap_or_else(|| DEFAULT_VERIFICATION_URL.to_owned());
        Ok(Self {
            host,
            port,
            verification_url,
        })
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `host:port` does not parse.
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|e| ConfigError::invalid("HOST", &raw, e))
    }
}

/// Everything the worker reads at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listener and mail settings.
    pub server: ServerConfig,
    /// CouchDB connection.
    pub couch: CouchConfig,
    /// Pump tuning.
    pub pumps: PumpConfig,
}

impl AppConfig {
    /// Reads the full configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed setting.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads the full configuration from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed setting.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_lookup(&lookup)?,
            couch: CouchConfig::from_lookup(&lookup)?,
            pumps: PumpConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.verification_url, DEFAULT_VERIFICATION_URL);
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_server_config_rejects_bad_port() {
        let result = ServerConfig::from_lookup(lookup(&[("PORT", "http")]));

        assert!(matches!(result, Err(ConfigError::Invalid { name: "PORT", .. })));
    }

    #[test]
    fn test_app_config_reads_every_section() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("COUCHDB_URL", "http://couch:5984"),
            ("HANDLER_TIMEOUT_MS", "750"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.couch.url, "http://couch:5984");
        assert_eq!(config.pumps.handler_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_app_config_requires_couchdb_url() {
        let result = AppConfig::from_lookup(lookup(&[]));

        assert_eq!(result.unwrap_err(), ConfigError::Missing("COUCHDB_URL"));
    }
}
