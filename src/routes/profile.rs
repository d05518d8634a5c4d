// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile snapshot and achievement routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::Achievement;
use crate::progression::{
    rank_info_for_level, streak_bonus_multiplier, xp_progress, Rank, XpProgress,
};
use crate::time_utils::today_utc;
use crate::AppState;
use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile))
        .route("/api/achievements", get(get_achievements))
}

// ─── Profile Snapshot ────────────────────────────────────────

/// Profile snapshot response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    pub user_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub level: u32,
    pub rank: Rank,
    pub title: String,
    pub rank_color: String,
    pub progress: XpProgress,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold: u64,
    pub streak_count: u32,
    /// Additive display bonus for the current streak (0.15 = +15%).
    pub streak_bonus: f64,
    pub today_study_xp: u32,
    pub study_remaining_today: u32,
    pub fitness_connected: bool,
    pub music_connected: bool,
    /// Achievements this load unlocked (gold already granted).
    pub new_achievements: Vec<Achievement>,
}

/// Get the current user's progression snapshot.
///
/// Loading settles the day's bookkeeping: study cap rollover, streak
/// evaluation, and achievement unlocks all happen here, so the returned
/// figures are current.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let today = today_utc();
    let (profile, new_achievements) = state.rewards.load_profile(&user.user_id, today).await?;

    let fitness_connected = state.strava.is_connected(&user.user_id).await?;
    let music_connected = state.spotify.is_connected(&user.user_id).await?;

    let info = rank_info_for_level(profile.current_level);

    Ok(Json(ProfileResponse {
        user_id: profile.user_id.clone(),
        total_xp: profile.total_xp,
        level: profile.current_level,
        rank: info.rank,
        title: info.title.to_string(),
        rank_color: info.color.to_string(),
        progress: xp_progress(profile.total_xp, profile.current_level),
        gold: profile.gold,
        streak_count: profile.streak_count,
        streak_bonus: streak_bonus_multiplier(profile.streak_count),
        today_study_xp: profile.today_study_xp,
        study_remaining_today: profile.study_remaining_today(today),
        fitness_connected,
        music_connected,
        new_achievements,
    }))
}

// ─── Achievements ────────────────────────────────────────────

/// One catalog achievement with the user's unlock state.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AchievementStatus {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub achievement: Achievement,
    pub unlocked: bool,
    pub unlocked_at: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AchievementsResponse {
    pub achievements: Vec<AchievementStatus>,
    pub unlocked_count: u32,
    pub total: u32,
}

/// Get the achievement catalog with the user's unlock state.
async fn get_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AchievementsResponse>> {
    let catalog = state.db.list_achievements().await?;
    let unlocked: HashMap<String, String> = state
        .db
        .list_user_achievements(&user.user_id)
        .await?
        .into_iter()
        .map(|u| (u.achievement_id, u.unlocked_at))
        .collect();

    let total = catalog.len() as u32;
    let unlocked_count = catalog
        .iter()
        .filter(|a| unlocked.contains_key(&a.id))
        .count() as u32;

    let achievements = catalog
        .into_iter()
        .map(|achievement| {
            let unlocked_at = unlocked.get(&achievement.id).cloned();
            AchievementStatus {
                unlocked: unlocked_at.is_some(),
                unlocked_at,
                achievement,
            }
        })
        .collect();

    Ok(Json(AchievementsResponse {
        achievements,
        unlocked_count,
        total,
    }))
}
