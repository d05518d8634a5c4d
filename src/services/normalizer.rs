// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turns raw provider records into XP totals and sync cursors.
//!
//! Everything here is pure. The sync service fetches records, runs them
//! through a summarizer, and persists the outcome in one transaction.

use crate::models::reward::{classify_activity_kind, RewardSource};

/// One activity as the fitness provider reports it.
#[derive(Debug, Clone)]
pub struct RawActivity {
    pub id: u64,
    pub kind: String,
    pub distance_meters: f64,
    /// Unix seconds.
    pub started_at: i64,
    pub manual: bool,
}

/// One play as the music provider reports it.
#[derive(Debug, Clone)]
pub struct RawPlay {
    pub duration_ms: u64,
    /// Unix milliseconds.
    pub played_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitnessSummary {
    pub xp_gained: u64,
    pub eligible_count: u32,
    pub ignored_manual: u32,
    /// Watermark to persist: max of the old cursor and every record seen,
    /// including manual and unrecognized ones.
    pub new_cursor: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningSummary {
    pub xp_gained: u64,
    pub eligible_count: u32,
    pub new_cursor_ms: i64,
}

/// Scores fitness records newer than `cursor`.
///
/// Manual entries earn nothing but still advance the watermark so they are
/// never re-fetched. Unrecognized activity kinds advance the watermark too
/// and count toward neither tally.
pub fn summarize_fitness(records: &[RawActivity], cursor: i64) -> FitnessSummary {
    let mut summary = FitnessSummary {
        xp_gained: 0,
        eligible_count: 0,
        ignored_manual: 0,
        new_cursor: cursor,
    };

    for record in records {
        if record.started_at <= cursor {
            continue;
        }
        summary.new_cursor = summary.new_cursor.max(record.started_at);

        if record.manual {
            summary.ignored_manual += 1;
            continue;
        }
        if classify_activity_kind(&record.kind).is_none() {
            continue;
        }

        let source = RewardSource::Fitness {
            kind: record.kind.clone(),
            distance_meters: record.distance_meters,
        };
        summary.xp_gained = summary.xp_gained.saturating_add(source.intrinsic_xp());
        summary.eligible_count += 1;
    }

    summary
}

/// Scores plays newer than `cursor_ms`.
///
/// Durations are summed in milliseconds and floored to minutes once, so a
/// batch of partial-minute tracks still earns the minutes it adds up to.
pub fn summarize_listening(records: &[RawPlay], cursor_ms: i64) -> ListeningSummary {
    let mut total_ms: u64 = 0;
    let mut summary = ListeningSummary {
        xp_gained: 0,
        eligible_count: 0,
        new_cursor_ms: cursor_ms,
    };

    for record in records {
        if record.played_at_ms <= cursor_ms {
            continue;
        }
        summary.new_cursor_ms = summary.new_cursor_ms.max(record.played_at_ms);
        total_ms = total_ms.saturating_add(record.duration_ms);
        summary.eligible_count += 1;
    }

    summary.xp_gained = total_ms / 60_000;
    summary
}
