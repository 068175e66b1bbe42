//! Pump and feed tuning.

use std::time::Duration;

use outbox_core::config::{env_lookup, millis_or};
use outbox_core::error::ConfigError;

/// Settings shared by the extraction pump and the message pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpConfig {
    /// How long a handler may run for one event before it is cancelled.
    pub handler_timeout: Duration,
    /// First delay before resubscribing after a feed failure. Doubles on
    /// each consecutive failure.
    pub reconnect_base_delay: Duration,
    /// Upper bound on the resubscribe delay.
    pub reconnect_max_delay: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(10),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}

impl PumpConfig {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads overrides from `lookup`: `HANDLER_TIMEOUT_MS`,
    /// `FEED_RECONNECT_BASE_MS`, `FEED_RECONNECT_MAX_MS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for malformed values, or if the base
    /// delay exceeds the maximum.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            handler_timeout: millis_or(&lookup, "HANDLER_TIMEOUT_MS", defaults.handler_timeout)?,
            reconnect_base_delay: millis_or(
                &lookup,
                "FEED_RECONNECT_BASE_MS",
                defaults.reconnect_base_delay,
            )?,
            reconnect_max_delay: millis_or(
                &lookup,
                "FEED_RECONNECT_MAX_MS",
                defaults.reconnect_max_delay,
            )?,
        };
        if config.reconnect_base_delay > config.reconnect_max_delay {
            return Err(ConfigError::invalid(
                "FEED_RECONNECT_BASE_MS",
                &config.reconnect_base_delay.as_millis().to_string(),
                "must not exceed FEED_RECONNECT_MAX_MS",
            ));
        }
        Ok(config)
    }

    /// Resubscribe delay after `failures` consecutive failures.
    #[must_use]
    pub fn reconnect_delay(&self, failures: u32) -> Duration {
        self.reconnect_base_delay
            .checked_mul(2u32.saturating_pow(failures))
            .map_or(self.reconnect_max_delay, |delay| delay.min(self.reconnect_max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_without_overrides_is_default() {
        let config = PumpConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config, PumpConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_handler_timeout() {
        let config = PumpConfig::from_lookup(|name| {
            (name == "HANDLER_TIMEOUT_MS").then(|| "1500".to_owned())
        })
        .unwrap();

        assert_eq!(config.handler_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_from_lookup_rejects_base_above_max() {
        let result = PumpConfig::from_lookup(|name| match name {
            "FEED_RECONNECT_BASE_MS" => Some("5000".to_owned()),
            "FEED_RECONNECT_MAX_MS" => Some("100".to_owned()),
            _ => None,
        });

        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "FEED_RECONNECT_BASE_MS", .. })
        ));
    }

    #[test]
    fn test_reconnect_delay_doubles_up_to_max() {
        let config = PumpConfig::default();

        assert_eq!(config.reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(config.reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(config.reconnect_delay(4), Duration::from_secs(16));
        assert_eq!(config.reconnect_delay(5), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(u32::MAX), Duration::from_secs(30));
    }
}
