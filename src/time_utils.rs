// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC3339 with fixed-width microseconds.
///
/// Always six fractional digits, so lexicographic order on the stored string
/// matches chronological order (the reward ledger sorts on this field).
pub fn format_utc_rfc3339_micros(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current calendar date in UTC. All rollover, streak, and assignment-day
/// logic runs on this one clock.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_format_is_fixed_width() {
        let on_second = DateTime::from_timestamp(1_754_000_000, 0).unwrap();
        let mid_second = DateTime::from_timestamp(1_754_000_000, 123_000).unwrap();

        let a = format_utc_rfc3339_micros(on_second);
        let b = format_utc_rfc3339_micros(mid_second);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
