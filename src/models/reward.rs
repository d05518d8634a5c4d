// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Reward sources and the reward ledger.
//!
//! Every XP-earning event is modeled as a [`RewardSource`] variant with its
//! own pure XP formula, so the reward service can stay source-agnostic and
//! the anti-cheat rules live in exactly one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::progression::{XP_PER_METER_CYCLING, XP_PER_METER_ENDURANCE, XP_PER_STUDY_MINUTE};
use crate::time_utils::format_utc_rfc3339_micros;

/// Distance-based reward tracks for fitness activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitnessTrack {
    /// Walking, running, hiking.
    Endurance,
    /// Cycling variants, at roughly a third of the endurance rate.
    Cycling,
}

/// Map a provider activity kind onto a reward track.
///
/// Unrecognized kinds return `None` and earn nothing (they still advance the
/// sync watermark).
pub fn classify_activity_kind(kind: &str) -> Option<FitnessTrack> {
    match kind {
        "Run" | "Walk" | "Hike" => Some(FitnessTrack::Endurance),
        "Ride" | "VirtualRide" | "EBikeRide" => Some(FitnessTrack::Cycling),
        _ => None,
    }
}

/// Where a reward came from, with enough data to recompute its XP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RewardSource {
    Fitness { kind: String, distance_meters: f64 },
    Listening { duration_ms: u64 },
    Study { minutes: u32 },
    Mission { mission_id: String },
}

impl RewardSource {
    /// XP intrinsic to the source itself.
    ///
    /// Fitness/listening/study have fixed formulas. Mission XP is priced
    /// dynamically against the live profile by the mission engine, so a
    /// mission source has no intrinsic XP here.
    pub fn intrinsic_xp(&self) -> u64 {
        match self {
            RewardSource::Fitness {
                kind,
                distance_meters,
            } => {
                let rate = match classify_activity_kind(kind) {
                    Some(FitnessTrack::Endurance) => XP_PER_METER_ENDURANCE,
                    Some(FitnessTrack::Cycling) => XP_PER_METER_CYCLING,
                    None => return 0,
                };
                // Floor, never round: rewards stay conservative and
                // reproducible.
                (distance_meters * rate).floor() as u64
            }
            // One XP per full minute; partial minutes are dropped.
            RewardSource::Listening { duration_ms } => duration_ms / 60_000,
            RewardSource::Study { minutes } => {
                (*minutes as u64) * (XP_PER_STUDY_MINUTE as u64)
            }
            RewardSource::Mission { .. } => 0,
        }
    }

    pub fn action(&self) -> RewardAction {
        match self {
            RewardSource::Fitness { .. } => RewardAction::FitnessSync,
            RewardSource::Listening { .. } => RewardAction::MusicSync,
            RewardSource::Study { .. } => RewardAction::StudySession,
            RewardSource::Mission { .. } => RewardAction::MissionCompleted,
        }
    }
}

/// Ledger entry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum RewardAction {
    FitnessSync,
    MusicSync,
    StudySession,
    MissionCompleted,
    ShopPurchase,
    AchievementUnlocked,
}

/// One row of the append-only reward history.
///
/// Stored in the `reward_log` collection; written in the same transaction as
/// the profile mutation it records. `created_at` uses a fixed-width
/// microsecond format so string ordering is chronological.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardLogEntry {
    pub entry_id: String,
    pub user_id: String,
    pub action: RewardAction,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_amount: u64,
    /// Negative for gold spent (purchases).
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold_amount: i64,
    pub description: String,
    pub created_at: String,
}

impl RewardLogEntry {
    pub fn new(
        user_id: &str,
        action: RewardAction,
        xp_amount: u64,
        gold_amount: i64,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: format!(
                "{}_{}",
                urlencoding::encode(user_id),
                now.timestamp_micros()
            ),
            user_id: user_id.to_string(),
            action,
            xp_amount,
            gold_amount,
            description: description.into(),
            created_at: format_utc_rfc3339_micros(now),
        }
    }
}
