// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Mission catalog templates and per-user daily assignments.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::progression::Rank;

/// Kind of evidence a mission expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum MissionType {
    /// Player self-reports completion.
    Manual,
    /// Tied to the fitness integration.
    Strava,
    /// Tied to the music integration.
    Spotify,
    /// Tied to a timed study session.
    Study,
}

/// Immutable catalog entry, administered outside the engine.
///
/// Stored in the `missions` collection, keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MissionTemplate {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub rank: Rank,
    /// Fixed gold payout; never scaled dynamically.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold_reward: u64,
    pub mission_type: MissionType,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Pending,
    Completed,
    Expired,
}

/// One user/mission/day assignment row.
///
/// Stored in the `mission_assignments` collection under a deterministic
/// document ID so duplicate generation attempts converge on the same rows.
/// Expiry is derived at read time; rows are never rewritten to `expired`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionAssignment {
    pub user_id: String,
    pub mission_id: String,
    pub assigned_date: NaiveDate,
    pub status: MissionStatus,
    pub assigned_at: String,
    pub completed_at: Option<String>,
    /// Midnight UTC after `assigned_date`.
    pub expires_at: String,
}

impl MissionAssignment {
    pub fn new(user_id: &str, mission_id: &str, assigned_date: NaiveDate, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            mission_id: mission_id.to_string(),
            assigned_date,
            status: MissionStatus::Pending,
            assigned_at: now.to_string(),
            completed_at: None,
            expires_at: expiry_for(assigned_date).to_rfc3339(),
        }
    }

    /// Deterministic document ID: one row per (user, day, mission).
    pub fn doc_id(user_id: &str, assigned_date: NaiveDate, mission_id: &str) -> String {
        format!(
            "{}_{}_{}",
            urlencoding::encode(user_id),
            assigned_date,
            urlencoding::encode(mission_id)
        )
    }

    /// Status with expiry derived against the current date: a pending row
    /// from an earlier day reads as expired without a write.
    pub fn effective_status(&self, today: NaiveDate) -> MissionStatus {
        if self.status == MissionStatus::Pending && self.assigned_date < today {
            MissionStatus::Expired
        } else {
            self.status
        }
    }
}

/// First UTC instant after the assignment day.
pub fn expiry_for(assigned_date: NaiveDate) -> DateTime<Utc> {
    assigned_date
        .succ_opt()
        .unwrap_or(assigned_date)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Once-per-day selection marker.
///
/// Stored in the `mission_days` collection at `{user}_{date}`; a transaction
/// that finds this document already present knows another trigger won the
/// generation race and backs off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySelection {
    pub user_id: String,
    pub assigned_date: NaiveDate,
    pub mission_ids: Vec<String>,
    pub created_at: String,
}

impl DailySelection {
    pub fn doc_id(user_id: &str, assigned_date: NaiveDate) -> String {
        format!("{}_{}", urlencoding::encode(user_id), assigned_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_assignment_doc_id_is_deterministic_and_safe() {
        let id = MissionAssignment::doc_id("user/1", date(2026, 8, 3), "run 5k");
        assert_eq!(id, "user%2F1_2026-08-03_run%205k");
        assert_eq!(
            id,
            MissionAssignment::doc_id("user/1", date(2026, 8, 3), "run 5k")
        );
    }

    #[test]
    fn test_pending_assignment_expires_at_date_rollover() {
        let assignment =
            MissionAssignment::new("u", "m", date(2026, 8, 3), "2026-08-03T08:00:00Z");

        assert_eq!(
            assignment.effective_status(date(2026, 8, 3)),
            MissionStatus::Pending
        );
        assert_eq!(
            assignment.effective_status(date(2026, 8, 4)),
            MissionStatus::Expired
        );
    }

    #[test]
    fn test_completed_assignment_never_reads_as_expired() {
        let mut assignment =
            MissionAssignment::new("u", "m", date(2026, 8, 3), "2026-08-03T08:00:00Z");
        assignment.status = MissionStatus::Completed;

        assert_eq!(
            assignment.effective_status(date(2026, 9, 1)),
            MissionStatus::Completed
        );
    }

    #[test]
    fn test_expiry_is_next_midnight_utc() {
        let expiry = expiry_for(date(2026, 8, 3));
        assert_eq!(expiry.to_rfc3339(), "2026-08-04T00:00:00+00:00");
    }
}
