//! Helpers for reading settings from the environment.
//!
//! Readers take a lookup function instead of touching the process
//! environment directly, so tests can feed settings from a map.

use std::time::Duration;

use crate::error::ConfigError;

/// Reads the process environment.
#[must_use]
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Returns the value of `name`, failing if it is absent or blank.
///
/// # Errors
///
/// Returns `ConfigError::Missing`.
pub fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Reads `name` as a whole number of milliseconds, or returns `default`.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if the value is not a positive integer.
pub fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) => Err(ConfigError::invalid(name, &raw, "must be greater than zero")),
            Ok(ms) => Ok(Duration::from_millis(ms)),
            Err(e) => Err(ConfigError::invalid(name, &raw, e)),
        },
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
    fn test_required_rejects_missing_and_blank() {
        let env = lookup(&[("BLANK", "  ")]);

        assert_eq!(required(&env, "ABSENT"), Err(ConfigError::Missing("ABSENT")));
        assert_eq!(required(&env, "BLANK"), Err(ConfigError::Missing("BLANK")));
    }

    #[test]
    fn test_millis_or_uses_default_when_absent() {
        let env = lookup(&[]);

        let value = millis_or(&env, "TIMEOUT_MS", Duration::from_secs(3)).unwrap();

        assert_eq!(value, Duration::from_secs(3));
    }

    #[test]
    fn test_millis_or_parses_and_validates() {
        let env = lookup(&[("A", "250"), ("B", "0"), ("C", "soon")]);

        assert_eq!(
            millis_or(&env, "A", Duration::ZERO).unwrap(),
            Duration::from_millis(250)
        );
        assert!(matches!(
            millis_or(&env, "B", Duration::ZERO),
            Err(ConfigError::Invalid { name: "B", .. })
        ));
        assert!(matches!(
            millis_or(&env, "C", Duration::ZERO),
            Err(ConfigError::Invalid { name: "C", .. })
        ));
    }
}
