//! # System Constants
//!
//! Core constants that define the storage layout and operational boundaries
//! of the raffle tracker. The string keys mirror the layout used by the
//! browser-side tracker so that storage dumps remain interchangeable between
//! the two implementations.

/// Persistent storage keys. All domain state lives under the `fmvTracker:`
/// namespace of the key-value boundary.
pub mod storage_keys {
    /// Prefix for per-day raffle buckets.
    pub const RAFFLE_BUCKET_PREFIX: &str = "fmvTracker:raffles:";

    /// Key of the `postId -> dayKey` index. Single source of truth for
    /// bucket ownership.
    pub const RAFFLE_INDEX: &str = "fmvTracker:raffleIndex";

    /// Key of the day-set: the day keys that currently own at least one
    /// raffle.
    pub const RAFFLE_DAYS: &str = "fmvTracker:raffleDays";

    /// Key of the persisted last-discovery timestamp (unix seconds).
    pub const LAST_DISCOVERY_AT: &str = "fmvTracker:lastDiscoveryAt";

    /// Prefix for per-day scan journal buckets.
    pub const DEBUG_LOG_PREFIX: &str = "fmvTracker:debugLog:";

    /// Bucket key for a day key.
    pub fn bucket_key(day_key: &str) -> String {
        format!("{RAFFLE_BUCKET_PREFIX}{day_key}")
    }

    /// Scan journal key for a day key.
    pub fn journal_key(day_key: &str) -> String {
        format!("{DEBUG_LOG_PREFIX}{day_key}")
    }

    /// Extract the day key from a bucket storage key, if it is one.
    pub fn day_key_of_bucket(storage_key: &str) -> Option<&str> {
        storage_key.strip_prefix(RAFFLE_BUCKET_PREFIX)
    }
}

/// Lifecycle event names published on the store's broadcast channel.
pub mod events {
    pub const STORE_INVALIDATED: &str = "store.invalidated";
    pub const SCAN_COMPLETED: &str = "scan.completed";
    pub const RAFFLE_RESOLVED: &str = "raffle.resolved";
    pub const RAFFLE_CLAIMED: &str = "raffle.claimed";
    pub const MAINTENANCE_EXPORTED: &str = "maintenance.exported";
}

/// Winner name the gateway reports when a raffle ended without a winner.
/// Compared case-insensitively.
pub const WINNER_NOBODY_SENTINEL: &str = "nobody";

/// Sticker tier that is never auto-claimed.
pub const AUTO_CLAIM_BLOCKED_STARS: u8 = 5;

/// Timestamps at or above this magnitude are millisecond-range and therefore
/// anomalous: every timestamp in the store is unix seconds.
pub const MILLISECOND_RANGE_THRESHOLD: i64 = 1_000_000_000_000;

/// Calendar-date format of day keys.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Returns true when a timestamp looks like unix milliseconds.
pub fn is_millisecond_range(timestamp: i64) -> bool {
    timestamp >= MILLISECOND_RANGE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_round_trip() {
        let key = storage_keys::bucket_key("2025-01-02");
        assert_eq!(key, "fmvTracker:raffles:2025-01-02");
        assert_eq!(storage_keys::day_key_of_bucket(&key), Some("2025-01-02"));
        assert_eq!(storage_keys::day_key_of_bucket("fmvTracker:raffleIndex"), None);
    }

    #[test]
    fn test_millisecond_range_detection() {
        assert!(!is_millisecond_range(1_735_689_600)); // 2025-01-01 in seconds
        assert!(is_millisecond_range(1_735_689_600_000)); // same instant in millis
    }
}
