// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider sync routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::sync::{FitnessSyncReport, MusicSyncReport};
use crate::time_utils::today_utc;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync/fitness", post(sync_fitness))
        .route("/api/sync/fitness/cooldown", get(fitness_cooldown))
        .route("/api/sync/music", post(sync_music))
}

/// Pull new Strava activities and bank their XP.
///
/// Rejected with 422 while the 15-minute cooldown is running; the
/// cooldown is spent even when the provider call fails.
async fn sync_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FitnessSyncReport>> {
    tracing::debug!(user_id = %user.user_id, "Fitness sync requested");

    let report = state.sync.sync_fitness(&user.user_id, today_utc()).await?;
    Ok(Json(report))
}

/// Cooldown state response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CooldownResponse {
    pub active: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub seconds_remaining: u64,
}

/// Seconds until the next fitness sync is allowed (0 when ready).
async fn fitness_cooldown(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CooldownResponse>> {
    let seconds_remaining = state.sync.fitness_cooldown_remaining(&user.user_id).await?;

    Ok(Json(CooldownResponse {
        active: seconds_remaining > 0,
        seconds_remaining,
    }))
}

/// Pull recent Spotify plays and bank listening XP. No cooldown.
async fn sync_music(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MusicSyncReport>> {
    tracing::debug!(user_id = %user.user_id, "Music sync requested");

    let report = state.sync.sync_music(&user.user_id, today_utc()).await?;
    Ok(Json(report))
}
