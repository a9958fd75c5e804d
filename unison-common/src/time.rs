//! Timestamp utilities
//!
//! All persisted timestamps are Unix seconds computed here and bound as
//! query parameters.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix seconds
pub fn unix_now() -> i64 {
    now().timestamp()
}

/// Start of a trailing window of `window_secs` ending at `now`
pub fn window_start(now: i64, window_secs: u64) -> i64 {
    now.saturating_sub(i64::try_from(window_secs).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_now_is_recent() {
        let ts = unix_now();
        assert!(ts > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(ts < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(10_000, 3600), 6_400);
        assert_eq!(window_start(10_000, 0), 10_000);
    }

    #[test]
    fn test_window_start_saturates() {
        assert_eq!(window_start(i64::MIN + 5, 3600), i64::MIN);
        assert_eq!(window_start(0, u64::MAX), -i64::MAX);
    }
}
