// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily mission selection and dynamic reward pricing.
//!
//! Selection is randomized but anchored to the user's rank; pricing is
//! recomputed from the live profile whenever a mission is shown or
//! completed, so a level-up between the two is reflected in the payout.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::firestore::{FirestoreDb, MissionCompletion};
use crate::error::{AppError, Result};
use crate::models::mission::{MissionAssignment, MissionStatus, MissionTemplate};
use crate::models::profile::Profile;
use crate::progression::{rank_from_level, xp_to_next_level, Rank};
use crate::time_utils::format_utc_rfc3339;

/// Missions assigned per day, when the catalog can fill them.
pub const DAILY_MISSION_COUNT: usize = 5;
/// How many of those should match the user's own rank.
const SAME_RANK_TARGET: usize = 2;
/// XP bonus applied on Saturdays and Sundays (UTC).
pub const WEEKEND_MULTIPLIER: f64 = 1.5;

// ─── Selection ───────────────────────────────────────────────

/// Ranks a user may be assigned missions from: two below through one
/// above their own, clamped to the table ends.
pub fn valid_rank_window(user_rank: Rank) -> Vec<Rank> {
    let center = user_rank.index() as i32;
    let last = (Rank::ALL.len() - 1) as i32;
    let low = (center - 2).max(0) as usize;
    let high = (center + 1).min(last) as usize;

    Rank::ALL[low..=high].to_vec()
}

/// Picks up to [`DAILY_MISSION_COUNT`] missions: up to [`SAME_RANK_TARGET`]
/// at the user's rank, the rest from the other ranks in the window. A thin
/// catalog yields a short day rather than repeats.
pub fn select_daily_missions<R: Rng + ?Sized>(
    catalog: &[MissionTemplate],
    user_rank: Rank,
    rng: &mut R,
) -> Vec<MissionTemplate> {
    let window = valid_rank_window(user_rank);
    let mut same_rank: Vec<&MissionTemplate> = Vec::new();
    let mut other_ranks: Vec<&MissionTemplate> = Vec::new();

    for mission in catalog {
        if !mission.is_active || !window.contains(&mission.rank) {
            continue;
        }
        if mission.rank == user_rank {
            same_rank.push(mission);
        } else {
            other_ranks.push(mission);
        }
    }

    let mut picked: Vec<MissionTemplate> = same_rank
        .choose_multiple(rng, SAME_RANK_TARGET)
        .map(|m| (*m).clone())
        .collect();
    let remaining = DAILY_MISSION_COUNT.saturating_sub(picked.len());
    picked.extend(
        other_ranks
            .choose_multiple(rng, remaining)
            .map(|m| (*m).clone()),
    );
    picked.shuffle(rng);

    picked
}

// ─── Pricing ─────────────────────────────────────────────────

/// A mission reward priced against a specific profile and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PricedReward {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub base_xp: u64,
    pub rank_multiplier: f64,
    pub weekend_multiplier: f64,
    /// Human-readable modifiers, e.g. `"-25% Rank"` or `"+50% Weekend"`.
    pub bonus_tags: Vec<String>,
}

/// Multiplier by how far the mission's rank sits from the user's.
pub fn rank_multiplier(user_rank: Rank, mission_rank: Rank) -> f64 {
    match mission_rank.index() as i32 - user_rank.index() as i32 {
        d if d <= -2 => 0.50,
        -1 => 0.75,
        0 => 1.00,
        _ => 1.25,
    }
}

/// Prices a mission's XP for a user at `level` on `date`.
///
/// Base is 2% of the XP span of the user's current level, so rewards scale
/// with progression without a per-mission XP column. Both the base and the
/// final figure floor to whole XP but never below 1.
pub fn price_mission(
    level: u32,
    user_rank: Rank,
    mission_rank: Rank,
    date: NaiveDate,
) -> PricedReward {
    let base_xp = ((xp_to_next_level(level) as f64 * 0.02).floor() as u64).max(1);
    let rank_mult = rank_multiplier(user_rank, mission_rank);
    let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    let weekend_mult = if weekend { WEEKEND_MULTIPLIER } else { 1.0 };

    let xp = ((base_xp as f64 * rank_mult * weekend_mult).floor() as u64).max(1);

    let mut bonus_tags = Vec::new();
    match mission_rank.index() as i32 - user_rank.index() as i32 {
        d if d <= -2 => bonus_tags.push("-50% Rank".to_string()),
        -1 => bonus_tags.push("-25% Rank".to_string()),
        0 => {}
        _ => bonus_tags.push("+25% Rank".to_string()),
    }
    if weekend {
        bonus_tags.push("+50% Weekend".to_string());
    }

    PricedReward {
        xp,
        base_xp,
        rank_multiplier: rank_mult,
        weekend_multiplier: weekend_mult,
        bonus_tags,
    }
}

// ─── Service ─────────────────────────────────────────────────

/// One assigned mission as the API presents it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MissionOffer {
    pub mission: MissionTemplate,
    pub status: MissionStatus,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub assigned_date: NaiveDate,
    pub completed_at: Option<String>,
    pub reward: PricedReward,
}

/// Assigns and completes daily missions.
#[derive(Clone)]
pub struct MissionService {
    db: FirestoreDb,
    /// Per-user locks so concurrent first-requests of the day generate one
    /// mission set instead of racing each other to the marker document.
    generation_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl MissionService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            generation_locks: Arc::new(DashMap::new()),
        }
    }

    /// Today's missions with live pricing, generating them on first call.
    pub async fn today_offers(&self, user_id: &str, today: NaiveDate) -> Result<Vec<MissionOffer>> {
        let assignments = self.assignments_for(user_id, today).await?;
        let profile = self
            .db
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id, Utc::now()));
        let user_rank = rank_from_level(profile.current_level);

        // Catalog lookup keeps offers renderable even for missions
        // deactivated after they were assigned.
        let catalog = self.db.list_missions().await?;
        let by_id: HashMap<&str, &MissionTemplate> =
            catalog.iter().map(|m| (m.id.as_str(), m)).collect();

        let mut offers = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let Some(mission) = by_id.get(assignment.mission_id.as_str()) else {
                warn!(
                    mission_id = %assignment.mission_id,
                    "assigned mission missing from catalog, skipping"
                );
                continue;
            };
            offers.push(MissionOffer {
                mission: (*mission).clone(),
                status: assignment.effective_status(today),
                assigned_date: assignment.assigned_date,
                completed_at: assignment.completed_at.clone(),
                reward: price_mission(profile.current_level, user_rank, mission.rank, today),
            });
        }

        Ok(offers)
    }

    /// Completes one of today's missions, granting XP priced at completion
    /// time plus the mission's fixed gold. Completing twice is a no-op that
    /// returns the already-settled state.
    pub async fn complete(
        &self,
        user_id: &str,
        mission_id: &str,
        today: NaiveDate,
    ) -> Result<MissionCompletion> {
        let mission = self
            .db
            .get_mission(mission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Mission {}", mission_id)))?;
        let assignment_id = MissionAssignment::doc_id(user_id, today, mission_id);

        self.db
            .complete_mission_atomic(user_id, &assignment_id, today, |profile| {
                let user_rank = rank_from_level(profile.current_level);
                let reward =
                    price_mission(profile.current_level, user_rank, mission.rank, today);
                (
                    reward.xp,
                    mission.gold_reward,
                    format!("Mission completed: {}", mission.title),
                )
            })
            .await
    }

    /// Fetches today's assignments, generating them if this is the first
    /// request of the day. Guarded by a per-user lock in this process and
    /// by the selection marker document across processes.
    async fn assignments_for(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<MissionAssignment>> {
        let existing = self.db.list_assignments_for_date(user_id, today).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let lock = self
            .generation_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another request may have generated while we waited on the lock.
        let existing = self.db.list_assignments_for_date(user_id, today).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let profile = self.db.get_profile(user_id).await?;
        let user_rank = rank_from_level(profile.map(|p| p.current_level).unwrap_or(1));
        let catalog = self.db.list_missions().await?;
        let selected = select_daily_missions(&catalog, user_rank, &mut rand::thread_rng());

        let now = format_utc_rfc3339(Utc::now());
        let assignments: Vec<MissionAssignment> = selected
            .iter()
            .map(|mission| MissionAssignment::new(user_id, &mission.id, today, &now))
            .collect();

        let created = self
            .db
            .create_daily_assignments_atomic(user_id, today, &assignments)
            .await?;
        if !created {
            // Another instance won the marker; serve what it wrote.
            return self.db.list_assignments_for_date(user_id, today).await;
        }

        info!(
            user_id = %user_id,
            date = %today,
            count = assignments.len(),
            "generated daily missions"
        );
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template(id: &str, rank: Rank, active: bool) -> MissionTemplate {
        MissionTemplate {
            id: id.to_string(),
            title: format!("Mission {}", id),
            description: None,
            rank,
            gold_reward: 10,
            mission_type: crate::models::mission::MissionType::Manual,
            is_active: active,
        }
    }

    #[test]
    fn test_rank_window_clamps_at_both_ends() {
        assert_eq!(valid_rank_window(Rank::F), vec![Rank::F, Rank::E]);
        assert_eq!(
            valid_rank_window(Rank::C),
            vec![Rank::E, Rank::D, Rank::C, Rank::B]
        );
        assert_eq!(valid_rank_window(Rank::S), vec![Rank::B, Rank::A, Rank::S]);
    }

    #[test]
    fn test_selection_favors_same_rank() {
        let mut catalog = Vec::new();
        for i in 0..6 {
            catalog.push(template(&format!("c{}", i), Rank::C, true));
        }
        for i in 0..6 {
            catalog.push(template(&format!("d{}", i), Rank::D, true));
        }

        let mut rng = StdRng::seed_from_u64(42);
        let picked = select_daily_missions(&catalog, Rank::C, &mut rng);

        assert_eq!(picked.len(), DAILY_MISSION_COUNT);
        let same = picked.iter().filter(|m| m.rank == Rank::C).count();
        assert_eq!(same, 2);
    }

    #[test]
    fn test_selection_does_not_backfill_a_thin_catalog() {
        let catalog = vec![
            template("c0", Rank::C, true),
            template("d0", Rank::D, true),
        ];

        let mut rng = StdRng::seed_from_u64(7);
        let picked = select_daily_missions(&catalog, Rank::C, &mut rng);

        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_selection_skips_inactive_and_out_of_window() {
        let catalog = vec![
            template("inactive", Rank::C, false),
            template("too-low", Rank::F, true),
            template("too-high", Rank::A, true),
            template("ok", Rank::B, true),
        ];

        let mut rng = StdRng::seed_from_u64(7);
        let picked = select_daily_missions(&catalog, Rank::C, &mut rng);

        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "ok");
    }

    #[test]
    fn test_selection_from_empty_catalog_is_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(select_daily_missions(&[], Rank::F, &mut rng).is_empty());
    }

    #[test]
    fn test_rank_multiplier_steps() {
        assert_eq!(rank_multiplier(Rank::C, Rank::F), 0.50);
        assert_eq!(rank_multiplier(Rank::C, Rank::E), 0.50);
        assert_eq!(rank_multiplier(Rank::C, Rank::D), 0.75);
        assert_eq!(rank_multiplier(Rank::C, Rank::C), 1.00);
        assert_eq!(rank_multiplier(Rank::C, Rank::B), 1.25);
    }

    #[test]
    fn test_pricing_at_level_ten() {
        // Level 10 spans 950 XP; 2% floors to 19.
        let weekday = NaiveDate::from_ymd_opt(2026, 8, 19).unwrap();
        let weekend = NaiveDate::from_ymd_opt(2026, 8, 22).unwrap();

        let flat = price_mission(10, Rank::E, Rank::E, weekday);
        assert_eq!(flat.base_xp, 19);
        assert_eq!(flat.xp, 19);
        assert!(flat.bonus_tags.is_empty());

        let boosted = price_mission(10, Rank::E, Rank::E, weekend);
        assert_eq!(boosted.xp, 28);
        assert_eq!(boosted.bonus_tags, vec!["+50% Weekend".to_string()]);

        let discounted = price_mission(10, Rank::E, Rank::F, weekday);
        assert_eq!(discounted.xp, 14);
        assert_eq!(discounted.bonus_tags, vec!["-25% Rank".to_string()]);

        let premium = price_mission(10, Rank::E, Rank::D, weekday);
        assert_eq!(premium.xp, 23);
        assert_eq!(premium.bonus_tags, vec!["+25% Rank".to_string()]);
    }

    #[test]
    fn test_pricing_never_drops_below_one() {
        // Level 1 spans 50 XP, so the base is already the floor of 1; a
        // -50% modifier must not price the mission at zero.
        let weekday = NaiveDate::from_ymd_opt(2026, 8, 19).unwrap();
        let priced = price_mission(1, Rank::C, Rank::E, weekday);

        assert_eq!(priced.base_xp, 1);
        assert_eq!(priced.xp, 1);
        assert_eq!(priced.bonus_tags, vec!["-50% Rank".to_string()]);
    }
}
