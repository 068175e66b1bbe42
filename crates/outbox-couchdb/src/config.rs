//! Connection settings.

use std::fmt;
use std::time::Duration;

use outbox_core::config::{env_lookup, millis_or, required};
use outbox_core::error::ConfigError;

/// Where and how to reach CouchDB.
#[derive(Clone, PartialEq, Eq)]
pub struct CouchConfig {
    /// Server base URL, e.g. `http://localhost:5984`.
    pub url: String,
    /// Database holding aggregates and domain events.
    pub database: String,
    /// Basic-auth user name.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Heartbeat interval requested on continuous change feeds.
    pub heartbeat: Duration,
}

impl CouchConfig {
    /// Creates a config for `url` and `database` with no credentials.
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: None,
            password: None,
            heartbeat: Duration::from_secs(10),
        }
    }

    /// Reads `COUCHDB_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `COUCHDB_URL` is missing or a value is
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads `COUCHDB_URL` (required), `COUCHDB_DATABASE` (default
    /// `outbox`), `COUCHDB_USER`, `COUCHDB_PASSWORD` and
    /// `COUCHDB_HEARTBEAT_MS` from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `COUCHDB_URL` is missing or a value is
    /// malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = required(&lookup, "COUCHDB_URL")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid("COUCHDB_URL", &url, "must be an http(s) URL"));
        }
        let database = lookup("COUCHDB_DATABASE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "outbox".to_owned());
        let defaults = Self::new(url, database);

        Ok(Self {
            username: lookup("COUCHDB_USER").filter(|value| !value.is_empty()),
            password: lookup("COUCHDB_PASSWORD"),
            heartbeat: millis_or(&lookup, "COUCHDB_HEARTBEAT_MS", defaults.heartbeat)?,
            ..defaults
        })
    }
}

impl fmt::Debug for CouchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_applies_defaults() {
        let config = CouchConfig::from_lookup(lookup(&[("COUCHDB_URL", "http://couch:5984")]))
            .unwrap();

        assert_eq!(config, CouchConfig::new("http://couch:5984", "outbox"));
    }

    #[test]
    fn test_from_lookup_reads_every_setting() {
        let config = CouchConfig::from_lookup(lookup(&[
            ("COUCHDB_URL", "https://couch.internal"),
            ("COUCHDB_DATABASE", "accounts"),
            ("COUCHDB_USER", "admin"),
            ("COUCHDB_PASSWORD", "secret"),
            ("COUCHDB_HEARTBEAT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.database, "accounts");
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.heartbeat, Duration::from_millis(2500));
    }

    #[test]
    fn test_from_lookup_requires_http_url() {
        assert_eq!(
            CouchConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("COUCHDB_URL"))
        );
        assert!(matches!(
            CouchConfig::from_lookup(lookup(&[("COUCHDB_URL", "couch:5984")])),
            Err(ConfigError::Invalid { name: "COUCHDB_URL", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = CouchConfig::new("http://couch:5984", "outbox");
        config.password = Some("hunter2".to_owned());

        let printed = format!("{config:?}");

        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }
}
