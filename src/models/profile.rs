//! User progression profile and its pure state transitions.
//!
//! The profile document is only ever mutated through these methods, inside
//! Firestore transactions driven by the reward service. Keeping the
//! transitions pure makes the cap/streak/level rules testable without a
//! database.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::{level_from_xp, STUDY_DAILY_CAP};
use crate::time_utils::format_utc_rfc3339;

/// Persisted progression state for one user.
///
/// Stored in the `profiles` collection, keyed by user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,

    // ─── Progression ─────────────────────────────────────────────
    /// Lifetime XP; never decreases outside admin correction.
    #[serde(default)]
    pub total_xp: u64,
    /// Cached level; invariant: largest L with xp_threshold(L-1) <= total_xp.
    #[serde(default = "default_level")]
    pub current_level: u32,
    #[serde(default)]
    pub gold: u64,

    // ─── Daily study cap ─────────────────────────────────────────
    /// Study XP earned on `last_study_date`; resets on date rollover.
    #[serde(default)]
    pub today_study_xp: u32,
    #[serde(default)]
    pub last_study_date: Option<NaiveDate>,

    // ─── Streak ──────────────────────────────────────────────────
    #[serde(default)]
    pub streak_count: u32,
    #[serde(default)]
    pub streak_last_date: Option<NaiveDate>,

    // ─── Sync watermarks ─────────────────────────────────────────
    /// Unix seconds of the newest fitness record already processed.
    #[serde(default)]
    pub fitness_sync_cursor: i64,
    /// Unix milliseconds of the newest listening record already processed.
    #[serde(default)]
    pub music_sync_cursor_ms: i64,

    // ─── Metadata ────────────────────────────────────────────────
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn default_level() -> u32 {
    1
}

/// Result of applying XP to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGrant {
    pub new_total_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
}

/// All-or-nothing rejection when a study grant would exceed the daily cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyCapExceeded {
    pub requested_xp: u32,
    pub remaining_xp: u32,
}

/// Outcome of the once-per-day streak evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOutcome {
    /// Active yesterday as well; streak grew by one.
    Extended,
    /// First activity ever, or a gap; streak restarted at 1.
    Reset,
    /// Already evaluated today; nothing changed.
    Unchanged,
}

impl Profile {
    /// Fresh profile for a first-time user.
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        let stamp = format_utc_rfc3339(now);
        Self {
            user_id: user_id.to_string(),
            total_xp: 0,
            current_level: 1,
            gold: 0,
            today_study_xp: 0,
            last_study_date: None,
            streak_count: 0,
            streak_last_date: None,
            fitness_sync_cursor: 0,
            music_sync_cursor_ms: 0,
            created_at: stamp.clone(),
            updated_at: stamp,
        }
    }

    /// Reset the daily study counter when the calendar date has rolled over.
    ///
    /// Returns `true` if anything changed.
    pub fn apply_daily_rollover(&mut self, today: NaiveDate) -> bool {
        if self.last_study_date == Some(today) {
            return false;
        }
        self.today_study_xp = 0;
        self.last_study_date = Some(today);
        true
    }

    /// Evaluate the consecutive-day streak, at most once per calendar day.
    ///
    /// Active exactly one day after `streak_last_date` extends the streak;
    /// any gap (or a first visit) resets it to 1; a repeat evaluation on the
    /// same day is a no-op. The date stamp is always advanced to `today`
    /// when a transition fires.
    pub fn evaluate_streak(&mut self, today: NaiveDate) -> StreakOutcome {
        if self.streak_last_date == Some(today) {
            return StreakOutcome::Unchanged;
        }

        let was_yesterday = today
            .pred_opt()
            .is_some_and(|yesterday| self.streak_last_date == Some(yesterday));

        if was_yesterday {
            self.streak_count += 1;
            self.streak_last_date = Some(today);
            StreakOutcome::Extended
        } else {
            self.streak_count = 1;
            self.streak_last_date = Some(today);
            StreakOutcome::Reset
        }
    }

    /// Add XP and recompute the cached level.
    pub fn apply_xp(&mut self, amount: u64) -> XpGrant {
        let previous_level = self.current_level;
        self.total_xp = self.total_xp.saturating_add(amount);
        self.current_level = level_from_xp(self.total_xp);

        XpGrant {
            new_total_xp: self.total_xp,
            new_level: self.current_level,
            leveled_up: self.current_level > previous_level,
        }
    }

    /// Grant study XP, enforcing the daily cap.
    ///
    /// The cap check is all-or-nothing: a grant that would push
    /// `today_study_xp` past the cap grants nothing. The daily counter is
    /// rolled over first, so a stale `last_study_date` cannot block a fresh
    /// day.
    pub fn apply_study_xp(
        &mut self,
        xp: u32,
        today: NaiveDate,
    ) -> Result<XpGrant, StudyCapExceeded> {
        self.apply_daily_rollover(today);

        let remaining = STUDY_DAILY_CAP.saturating_sub(self.today_study_xp);
        if xp > remaining {
            return Err(StudyCapExceeded {
                requested_xp: xp,
                remaining_xp: remaining,
            });
        }

        self.today_study_xp += xp;
        Ok(self.apply_xp(xp as u64))
    }

    /// Study XP still grantable today.
    pub fn study_remaining_today(&self, today: NaiveDate) -> u32 {
        if self.last_study_date == Some(today) {
            STUDY_DAILY_CAP.saturating_sub(self.today_study_xp)
        } else {
            STUDY_DAILY_CAP
        }
    }

    pub fn add_gold(&mut self, amount: u64) {
        self.gold = self.gold.saturating_add(amount);
    }

    /// Deduct gold if the balance covers it. Returns `false` (and leaves the
    /// balance untouched) when it does not.
    pub fn try_spend_gold(&mut self, amount: u64) -> bool {
        match self.gold.checked_sub(amount) {
            Some(rest) => {
                self.gold = rest;
                true
            }
            None => false,
        }
    }

    /// Advance the fitness watermark; it never moves backward.
    pub fn advance_fitness_cursor(&mut self, candidate: i64) {
        self.fitness_sync_cursor = self.fitness_sync_cursor.max(candidate);
    }

    /// Advance the listening watermark; it never moves backward.
    pub fn advance_music_cursor(&mut self, candidate_ms: i64) {
        self.music_sync_cursor_ms = self.music_sync_cursor_ms.max(candidate_ms);
    }
}
