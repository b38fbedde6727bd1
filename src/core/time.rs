//! Wall-clock helpers.
//!
//! Game timing inside rooms uses `tokio::time::Instant`; wall-clock values
//! only appear on the wire (session start time) and in seeds.

use chrono::Utc;

/// Current unix time in milliseconds.
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(unix_millis() > 1_577_836_800_000);
    }
}
