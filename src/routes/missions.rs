// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily mission routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::missions::MissionOffer;
use crate::time_utils::today_utc;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/missions/today", get(today_missions))
        .route("/api/missions/{mission_id}/complete", post(complete_mission))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TodayMissionsResponse {
    pub date: String,
    pub missions: Vec<MissionOffer>,
}

/// Get today's missions with live pricing, generating the daily set on
/// the first request of the day.
async fn today_missions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TodayMissionsResponse>> {
    let today = today_utc();
    tracing::debug!(user_id = %user.user_id, date = %today, "Fetching today's missions");

    let missions = state.missions.today_offers(&user.user_id, today).await?;

    Ok(Json(TodayMissionsResponse {
        date: today.to_string(),
        missions,
    }))
}

/// Mission completion response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompleteMissionResponse {
    /// True when the mission had already been completed; nothing was
    /// granted again.
    pub already_completed: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_awarded: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold_awarded: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold: u64,
}

/// Complete one of today's missions.
///
/// XP is priced at completion time against the user's current level and
/// rank. Completing an already-completed mission is a no-op that returns
/// the settled state.
async fn complete_mission(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(mission_id): Path<String>,
) -> Result<Json<CompleteMissionResponse>> {
    let today = today_utc();
    tracing::debug!(
        user_id = %user.user_id,
        mission_id = %mission_id,
        "Mission completion requested"
    );

    let outcome = state
        .missions
        .complete(&user.user_id, &mission_id, today)
        .await?;

    Ok(Json(CompleteMissionResponse {
        already_completed: outcome.already_completed,
        xp_awarded: outcome.xp_awarded,
        gold_awarded: outcome.gold_awarded,
        total_xp: outcome.grant.new_total_xp,
        new_level: outcome.grant.new_level,
        leveled_up: outcome.grant.leveled_up,
        gold: outcome.profile.gold,
    }))
}
