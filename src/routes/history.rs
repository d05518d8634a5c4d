// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reward history route.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::RewardLogEntry;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_PAGE_SIZE: u32 = 100;

fn default_limit() -> u32 {
    50
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/history", get(get_history))
}

#[derive(Deserialize)]
struct HistoryQuery {
    /// Opaque pagination token from a previous page.
    cursor: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
}

/// The ledger's `created_at` strings are fixed-width, so the cursor is
/// just the last-seen timestamp, wrapped to keep it opaque.
fn parse_cursor(cursor: Option<&str>) -> Result<Option<String>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded = String::from_utf8(decoded).map_err(|_| invalid_cursor())?;
            chrono::DateTime::parse_from_rfc3339(&decoded).map_err(|_| invalid_cursor())?;

            Ok(decoded)
        })
        .transpose()
}

fn encode_cursor(created_at: &str) -> String {
    URL_SAFE_NO_PAD.encode(created_at)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HistoryResponse {
    pub entries: Vec<RewardLogEntry>,
    /// Present when another page is available.
    pub next_cursor: Option<String>,
}

/// Get the user's reward history, newest first.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
    let before = parse_cursor(params.cursor.as_deref())?;

    tracing::debug!(
        user_id = %user.user_id,
        limit,
        cursor = ?params.cursor,
        "Fetching reward history"
    );

    // Fetch one extra item to determine if another page is available.
    let fetch_limit = limit.saturating_add(1);
    let mut entries = state
        .db
        .list_reward_log(&user.user_id, fetch_limit, before.as_deref())
        .await?;

    let has_more = entries.len() > limit as usize;
    if has_more {
        entries.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        entries.last().map(|entry| encode_cursor(&entry.created_at))
    } else {
        None
    };

    Ok(Json(HistoryResponse {
        entries,
        next_cursor,
    }))
}
