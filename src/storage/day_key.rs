//! Day-key derivation.
//!
//! A raffle is owned by the calendar day of its effective timestamp
//! (end time, else last seen, else first seen, else created, else now). Day
//! keys are computed in a fixed configured UTC offset rather than ambient
//! machine time, so every context sharing a store shards identically.

use crate::constants::DAY_KEY_FORMAT;
use crate::models::Raffle;
use chrono::{DateTime, FixedOffset, Utc};

/// Format a unix-seconds timestamp as a day key in the given offset.
pub fn format_day_key(timestamp: i64, utc_offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let instant = DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_else(|| Utc::now());
    instant
        .with_timezone(&offset)
        .format(DAY_KEY_FORMAT)
        .to_string()
}

/// Compute the owning day key for a raffle at time `now`.
pub fn day_key_for(raffle: &Raffle, utc_offset_minutes: i32, now: i64) -> String {
    format_day_key(
        raffle.effective_timestamp().unwrap_or(now),
        utc_offset_minutes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-01-01T23:30:00Z
    const LATE_NEW_YEARS_EVE_UTC: i64 = 1_735_774_200;

    #[test]
    fn test_format_day_key_utc() {
        assert_eq!(format_day_key(LATE_NEW_YEARS_EVE_UTC, 0), "2025-01-01");
    }

    #[test]
    fn test_offset_shifts_the_boundary() {
        // 23:30 UTC is already past midnight one hour east, and still the
        // previous evening five hours west.
        assert_eq!(format_day_key(LATE_NEW_YEARS_EVE_UTC, 60), "2025-01-02");
        assert_eq!(format_day_key(LATE_NEW_YEARS_EVE_UTC, -300), "2025-01-01");
    }

    #[test]
    fn test_day_key_priority_falls_back_to_now() {
        let raffle = Raffle {
            post_id: "t3_abc".into(),
            ..Raffle::default()
        };
        assert_eq!(
            day_key_for(&raffle, 0, LATE_NEW_YEARS_EVE_UTC),
            "2025-01-01"
        );
    }

    #[test]
    fn test_day_key_prefers_end_time() {
        let mut raffle = Raffle {
            post_id: "t3_abc".into(),
            last_seen_at: Some(LATE_NEW_YEARS_EVE_UTC),
            ..Raffle::default()
        };
        raffle.raffle.end_time = Some(LATE_NEW_YEARS_EVE_UTC + 86_400);
        assert_eq!(day_key_for(&raffle, 0, 0), "2025-01-02");
    }
}
