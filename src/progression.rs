// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progression formulas: XP thresholds, levels, ranks, and streak bonuses.
//!
//! Everything in this module is pure and synchronous. These functions are
//! called on every profile read and inside reward transactions, so they must
//! be total for all valid inputs and never allocate unless returning owned
//! display data.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

// ─── Constants ───────────────────────────────────────────────

/// XP granted per meter on the endurance track (walk/run/hike).
pub const XP_PER_METER_ENDURANCE: f64 = 0.27;
/// XP granted per meter on the cycling track (roughly 1/3 of endurance).
pub const XP_PER_METER_CYCLING: f64 = 0.09;
/// XP granted per full minute of a study session.
pub const XP_PER_STUDY_MINUTE: u32 = 7;
/// Maximum study XP a user may earn per calendar day.
pub const STUDY_DAILY_CAP: u32 = 1500;
/// Study session presets, in minutes.
pub const SESSION_SHORT_MIN: u32 = 25;
pub const SESSION_LONG_MIN: u32 = 50;

// ─── Levels ──────────────────────────────────────────────────

/// Cumulative XP required to reach `level`.
///
/// `xp_threshold(0) == 0`; strictly increasing for level >= 1.
pub fn xp_threshold(level: u32) -> u64 {
    50 * (level as u64) * (level as u64)
}

/// XP required to go from `level` to `level + 1`.
pub fn xp_to_next_level(level: u32) -> u64 {
    xp_threshold(level) - xp_threshold(level.saturating_sub(1))
}

/// The largest `level >= 1` such that `xp_threshold(level - 1) <= total_xp`.
///
/// 0 XP maps to level 1. Solving `50 * (L-1)^2 <= xp` gives
/// `L = isqrt(xp / 50) + 1`; integer square root keeps the boundary exact
/// where float math would not.
pub fn level_from_xp(total_xp: u64) -> u32 {
    // isqrt(u64::MAX / 50) < u32::MAX, so the cast cannot truncate.
    (total_xp / 50).isqrt() as u32 + 1
}

/// Progress within the current level, for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct XpProgress {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_into_level: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_needed_for_level: u64,
    /// Clamped to [0, 100].
    pub percent_complete: f64,
}

/// Compute progress toward the next level from cached state.
///
/// `current_level` is the caller's cached level; if it is stale relative to
/// `total_xp` the percentage clamps rather than going out of range.
pub fn xp_progress(total_xp: u64, current_level: u32) -> XpProgress {
    let floor = xp_threshold(current_level.saturating_sub(1));
    let ceiling = xp_threshold(current_level.max(1));
    let xp_into_level = total_xp.saturating_sub(floor);
    let xp_needed_for_level = ceiling - floor;
    let percent_complete =
        ((xp_into_level as f64 / xp_needed_for_level as f64) * 100.0).clamp(0.0, 100.0);

    XpProgress {
        xp_into_level,
        xp_needed_for_level,
        percent_complete,
    }
}

// ─── Ranks ───────────────────────────────────────────────────

/// The seven ordinal ranks, weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Rank {
    F,
    E,
    D,
    C,
    B,
    A,
    S,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::F,
        Rank::E,
        Rank::D,
        Rank::C,
        Rank::B,
        Rank::A,
        Rank::S,
    ];

    /// Ordinal position, F = 0 through S = 6.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rank::F => "F",
            Rank::E => "E",
            Rank::D => "D",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::S => "S",
        };
        f.write_str(s)
    }
}

/// One row of the rank table: threshold, rank, title, and display color.
///
/// Rank and title share this single table so the two can never drift apart.
#[derive(Debug, Clone, Copy)]
pub struct RankInfo {
    pub min_level: u32,
    pub rank: Rank,
    pub title: &'static str,
    pub color: &'static str,
}

/// Ordered by `min_level` ascending; lookup takes the last row not exceeding
/// the level.
pub const RANK_TABLE: [RankInfo; 7] = [
    RankInfo {
        min_level: 1,
        rank: Rank::F,
        title: "Novice",
        color: "#4a4a4a",
    },
    RankInfo {
        min_level: 10,
        rank: Rank::E,
        title: "Apprentice",
        color: "#cd7f32",
    },
    RankInfo {
        min_level: 20,
        rank: Rank::D,
        title: "Adept",
        color: "#a8a8a8",
    },
    RankInfo {
        min_level: 30,
        rank: Rank::C,
        title: "Veteran",
        color: "#ffd700",
    },
    RankInfo {
        min_level: 40,
        rank: Rank::B,
        title: "Elite",
        color: "#4169e1",
    },
    RankInfo {
        min_level: 50,
        rank: Rank::A,
        title: "Master",
        color: "#9932cc",
    },
    RankInfo {
        min_level: 65,
        rank: Rank::S,
        title: "Legend",
        color: "#ff4500",
    },
];

/// Rank table row for a level. Levels below 1 clamp to the first row.
pub fn rank_info_for_level(level: u32) -> &'static RankInfo {
    RANK_TABLE
        .iter()
        .rev()
        .find(|info| level >= info.min_level)
        .unwrap_or(&RANK_TABLE[0])
}

pub fn rank_from_level(level: u32) -> Rank {
    rank_info_for_level(level).rank
}

pub fn title_for_level(level: u32) -> &'static str {
    rank_info_for_level(level).title
}

// ─── Streaks ─────────────────────────────────────────────────

/// Additive bonus fraction for a consecutive-day streak (0.15 = +15%).
///
/// Display-facing: grants are not silently multiplied by this.
pub fn streak_bonus_multiplier(streak_days: u32) -> f64 {
    match streak_days {
        d if d >= 30 => 0.25,
        d if d >= 14 => 0.20,
        d if d >= 7 => 0.15,
        d if d >= 3 => 0.10,
        d if d >= 1 => 0.05,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xp_threshold_values() {
        assert_eq!(xp_threshold(0), 0);
        assert_eq!(xp_threshold(1), 50);
        assert_eq!(xp_threshold(2), 200);
        assert_eq!(xp_threshold(9), 4050);
        assert_eq!(xp_threshold(10), 5000);
    }

    #[test]
    fn test_level_from_xp_boundaries() {
        assert_eq!(level_from_xp(0), 1);
        assert_eq!(level_from_xp(49), 1);
        assert_eq!(level_from_xp(50), 2);
        assert_eq!(level_from_xp(199), 2);
        assert_eq!(level_from_xp(200), 3);
    }

    #[test]
    fn test_level_is_monotonic_in_xp() {
        let mut prev = 0;
        for xp in (0..100_000).step_by(7) {
            let level = level_from_xp(xp);
            assert!(level >= prev, "level regressed at xp={}", xp);
            prev = level;
        }
    }

    #[test]
    fn test_threshold_is_exact_level_boundary() {
        // Landing exactly on a threshold means the level-up happened.
        for level in 1..200 {
            assert_eq!(level_from_xp(xp_threshold(level)), level + 1);
            assert_eq!(level_from_xp(xp_threshold(level) - 1), level);
        }
    }

    #[test]
    fn test_xp_to_next_level() {
        assert_eq!(xp_to_next_level(1), 50);
        assert_eq!(xp_to_next_level(10), 950);
    }

    #[test]
    fn test_xp_progress_midway() {
        // Level 2 spans 50..200.
        let progress = xp_progress(125, 2);
        assert_eq!(progress.xp_into_level, 75);
        assert_eq!(progress.xp_needed_for_level, 150);
        assert_eq!(progress.percent_complete, 50.0);
    }

    #[test]
    fn test_xp_progress_clamps() {
        // Stale cached level: progress clamps instead of exceeding 100.
        let progress = xp_progress(10_000, 2);
        assert_eq!(progress.percent_complete, 100.0);

        let fresh = xp_progress(0, 1);
        assert_eq!(fresh.percent_complete, 0.0);
    }

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(rank_from_level(1), Rank::F);
        assert_eq!(rank_from_level(9), Rank::F);
        assert_eq!(rank_from_level(10), Rank::E);
        assert_eq!(rank_from_level(19), Rank::E);
        assert_eq!(rank_from_level(20), Rank::D);
        assert_eq!(rank_from_level(30), Rank::C);
        assert_eq!(rank_from_level(40), Rank::B);
        assert_eq!(rank_from_level(50), Rank::A);
        assert_eq!(rank_from_level(64), Rank::A);
        assert_eq!(rank_from_level(65), Rank::S);
        assert_eq!(rank_from_level(1000), Rank::S);
    }

    #[test]
    fn test_rank_and_title_come_from_one_table() {
        for info in &RANK_TABLE {
            assert_eq!(rank_from_level(info.min_level), info.rank);
            assert_eq!(title_for_level(info.min_level), info.title);
        }
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::F < Rank::E);
        assert!(Rank::A < Rank::S);
        assert_eq!(Rank::C.index(), 3);
    }

    #[test]
    fn test_streak_bonus_steps() {
        assert_eq!(streak_bonus_multiplier(0), 0.0);
        assert_eq!(streak_bonus_multiplier(1), 0.05);
        assert_eq!(streak_bonus_multiplier(2), 0.05);
        assert_eq!(streak_bonus_multiplier(3), 0.10);
        assert_eq!(streak_bonus_multiplier(7), 0.15);
        assert_eq!(streak_bonus_multiplier(14), 0.20);
        assert_eq!(streak_bonus_multiplier(30), 0.25);
        assert_eq!(streak_bonus_multiplier(365), 0.25);
    }
}
