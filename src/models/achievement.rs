// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement catalog and unlock records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::profile::Profile;

/// Which profile figure an achievement is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    TotalXp,
    Level,
    Streak,
    Gold,
    /// Met as soon as a fitness provider credential is on file;
    /// `requirement_value` is ignored.
    FitnessConnected,
}

/// Catalog entry, administered outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub requirement_type: RequirementKind,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub requirement_value: u64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold_reward: u64,
}

impl Achievement {
    /// Evaluates the requirement against the current profile. Streak and
    /// gold compare the live counters, so a later reset does not revoke
    /// an unlock already recorded.
    pub fn is_met(&self, profile: &Profile, fitness_connected: bool) -> bool {
        match self.requirement_type {
            RequirementKind::TotalXp => profile.total_xp >= self.requirement_value,
            RequirementKind::Level => u64::from(profile.current_level) >= self.requirement_value,
            RequirementKind::Streak => u64::from(profile.streak_count) >= self.requirement_value,
            RequirementKind::Gold => profile.gold >= self.requirement_value,
            RequirementKind::FitnessConnected => fitness_connected,
        }
    }
}

/// One unlock. Stored in `user_achievements`, keyed by
/// `{user_id}_{achievement_id}` so an achievement unlocks at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_id: String,
    pub unlocked_at: String,
}

impl UserAchievement {
    pub fn new(user_id: &str, achievement_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            achievement_id: achievement_id.to_string(),
            unlocked_at: now.to_rfc3339(),
        }
    }

    pub fn doc_id(user_id: &str, achievement_id: &str) -> String {
        format!(
            "{}_{}",
            urlencoding::encode(user_id),
            urlencoding::encode(achievement_id)
        )
    }
}
