// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study session routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::progression::{
    SESSION_LONG_MIN, SESSION_SHORT_MIN, STUDY_DAILY_CAP, XP_PER_STUDY_MINUTE,
};
use crate::time_utils::today_utc;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Longest recordable session; anything above this is client error, not
/// a marathon.
const MAX_SESSION_MINUTES: u32 = 480;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/study/sessions", post(add_session))
        .route("/api/study/presets", get(get_presets))
}

// ─── Recording ───────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
struct StudySessionRequest {
    #[validate(range(
        min = 1,
        max = 480,
        message = "minutes must be between 1 and 480"
    ))]
    minutes: u32,
}

/// Study session response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StudySessionResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_awarded: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    pub today_study_xp: u32,
    pub remaining_today: u32,
    pub streak_count: u32,
}

/// Record a completed study session.
///
/// A canceled timer is simply never submitted, so it grants nothing. The
/// daily cap is all-or-nothing: sessions that would cross it come back as
/// 422 without granting partial XP.
async fn add_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<StudySessionRequest>,
) -> Result<Json<StudySessionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(format!("invalid study session: {}", e)))?;

    tracing::debug!(
        user_id = %user.user_id,
        minutes = payload.minutes,
        "Recording study session"
    );

    let outcome = state
        .rewards
        .add_study_session(&user.user_id, payload.minutes, today_utc())
        .await?;

    Ok(Json(StudySessionResponse {
        xp_awarded: outcome.xp_awarded,
        total_xp: outcome.grant.new_total_xp,
        new_level: outcome.grant.new_level,
        leveled_up: outcome.grant.leveled_up,
        today_study_xp: outcome.profile.today_study_xp,
        remaining_today: outcome.remaining_today,
        streak_count: outcome.profile.streak_count,
    }))
}

// ─── Presets ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StudyPreset {
    pub minutes: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StudyPresetsResponse {
    pub presets: Vec<StudyPreset>,
    pub xp_per_minute: u32,
    pub daily_cap: u32,
    pub remaining_today: u32,
    pub max_session_minutes: u32,
}

/// Get the session presets and the user's remaining daily allowance.
async fn get_presets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StudyPresetsResponse>> {
    let today = today_utc();
    let remaining_today = state
        .db
        .get_profile(&user.user_id)
        .await?
        .map(|p| p.study_remaining_today(today))
        .unwrap_or(STUDY_DAILY_CAP);

    let presets = [SESSION_SHORT_MIN, SESSION_LONG_MIN]
        .into_iter()
        .map(|minutes| StudyPreset {
            minutes,
            xp: u64::from(minutes) * u64::from(XP_PER_STUDY_MINUTE),
        })
        .collect();

    Ok(Json(StudyPresetsResponse {
        presets,
        xp_per_minute: XP_PER_STUDY_MINUTE,
        daily_cap: STUDY_DAILY_CAP,
        remaining_today,
        max_session_minutes: MAX_SESSION_MINUTES,
    }))
}
