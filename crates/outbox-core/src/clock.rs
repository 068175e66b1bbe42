//! Event timestamps.
//!
//! Timestamps end up in the `created_at` and `published_at` fields of the
//! wire envelope, where other consumers of the database read them as
//! JavaScript dates. The system clock therefore keeps millisecond precision
//! only, so a timestamp compares equal after any round trip through the
//! store.

use chrono::{DateTime, SubsecRound, Utc};

/// Source of event timestamps. Injected so tests can pin them.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to whole milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_has_millisecond_precision() {
        let now = SystemClock.now();

        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_system_clock_timestamp_survives_wire_round_trip() {
        let now = SystemClock.now();

        let encoded = serde_json::to_string(&now).unwrap();
        let millis = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap();

        assert_eq!(serde_json::from_str::<DateTime<Utc>>(&encoded).unwrap(), now);
        assert_eq!(millis, now);
    }
}
