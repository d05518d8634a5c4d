// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider sync orchestration.
//!
//! A sync is: check the cooldown, stamp a new window, fetch records after
//! the stored cursor, score them, then bank XP and the advanced cursor in
//! one transaction. The cursor comparison inside the transaction is the
//! idempotency guard: a concurrent sync of the same batch finds the cursor
//! already advanced and banks nothing.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::firestore::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::profile::XpGrant;
use crate::models::reward::{RewardAction, RewardLogEntry};
use crate::services::cooldown::{CooldownTracker, FITNESS_SYNC_COOLDOWN_SECS};
use crate::services::normalizer::{summarize_fitness, summarize_listening};
use crate::services::spotify::SpotifyService;
use crate::services::strava::StravaService;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FitnessSyncReport {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_gained: u64,
    pub eligible_count: u32,
    pub ignored_manual: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    /// Watermark after this sync (Unix seconds).
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub cursor: i64,
    /// Seconds until the next sync is allowed.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MusicSyncReport {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_gained: u64,
    pub eligible_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    /// Watermark after this sync (Unix milliseconds).
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub cursor_ms: i64,
}

#[derive(Clone)]
pub struct SyncService {
    db: FirestoreDb,
    strava: StravaService,
    spotify: SpotifyService,
    cooldowns: CooldownTracker,
}

impl SyncService {
    pub fn new(
        db: FirestoreDb,
        strava: StravaService,
        spotify: SpotifyService,
        cooldowns: CooldownTracker,
    ) -> Self {
        Self {
            db,
            strava,
            spotify,
            cooldowns,
        }
    }

    /// Pulls new fitness activities and banks their XP.
    ///
    /// The cooldown window is stamped before Strava is contacted, so a
    /// failed fetch still spends it. Provider failures leave the cursor
    /// where it was; the next allowed sync re-fetches the same records.
    pub async fn sync_fitness(&self, user_id: &str, today: NaiveDate) -> Result<FitnessSyncReport> {
        let remaining = self.cooldowns.fitness_sync_remaining(user_id).await?;
        if remaining > 0 {
            return Err(AppError::Validation(format!(
                "fitness sync on cooldown: {}s remaining",
                remaining
            )));
        }

        let cursor = self
            .db
            .get_profile(user_id)
            .await?
            .map(|p| p.fitness_sync_cursor)
            .unwrap_or(0);

        self.cooldowns.start_fitness_sync(user_id).await?;

        let records = self.strava.fetch_activities_since(user_id, cursor).await?;
        let summary = summarize_fitness(&records, cursor);

        let log = (summary.xp_gained > 0).then(|| {
            RewardLogEntry::new(
                user_id,
                RewardAction::FitnessSync,
                summary.xp_gained,
                0,
                format!("Fitness sync: {} activities", summary.eligible_count),
                Utc::now(),
            )
        });

        let (profile, grant) = self
            .db
            .update_profile_atomic(user_id, log.as_ref(), |profile| {
                // Already banked by a concurrent sync, or nothing new.
                if summary.new_cursor <= profile.fitness_sync_cursor {
                    return Ok(None);
                }
                profile.apply_daily_rollover(today);
                profile.advance_fitness_cursor(summary.new_cursor);
                Ok(Some(profile.apply_xp(summary.xp_gained)))
            })
            .await?;

        let grant = grant.unwrap_or(XpGrant {
            new_total_xp: profile.total_xp,
            new_level: profile.current_level,
            leveled_up: false,
        });

        info!(
            user_id = %user_id,
            xp = summary.xp_gained,
            eligible = summary.eligible_count,
            ignored_manual = summary.ignored_manual,
            leveled_up = grant.leveled_up,
            "fitness sync complete"
        );

        Ok(FitnessSyncReport {
            xp_gained: summary.xp_gained,
            eligible_count: summary.eligible_count,
            ignored_manual: summary.ignored_manual,
            total_xp: grant.new_total_xp,
            new_level: grant.new_level,
            leveled_up: grant.leveled_up,
            cursor: profile.fitness_sync_cursor,
            cooldown_seconds: FITNESS_SYNC_COOLDOWN_SECS,
        })
    }

    /// Seconds left on the user's fitness sync cooldown.
    pub async fn fitness_cooldown_remaining(&self, user_id: &str) -> Result<u64> {
        self.cooldowns.fitness_sync_remaining(user_id).await
    }

    /// Pulls recent plays and banks listening XP. No cooldown: Spotify's
    /// 50-item window bounds the damage a tight poll loop could do.
    pub async fn sync_music(&self, user_id: &str, today: NaiveDate) -> Result<MusicSyncReport> {
        let cursor_ms = self
            .db
            .get_profile(user_id)
            .await?
            .map(|p| p.music_sync_cursor_ms)
            .unwrap_or(0);

        let plays = self.spotify.fetch_plays_since(user_id, cursor_ms).await?;
        let summary = summarize_listening(&plays, cursor_ms);

        let log = (summary.xp_gained > 0).then(|| {
            RewardLogEntry::new(
                user_id,
                RewardAction::MusicSync,
                summary.xp_gained,
                0,
                format!("Music sync: {} plays", summary.eligible_count),
                Utc::now(),
            )
        });

        let (profile, grant) = self
            .db
            .update_profile_atomic(user_id, log.as_ref(), |profile| {
                if summary.new_cursor_ms <= profile.music_sync_cursor_ms {
                    return Ok(None);
                }
                profile.apply_daily_rollover(today);
                profile.advance_music_cursor(summary.new_cursor_ms);
                Ok(Some(profile.apply_xp(summary.xp_gained)))
            })
            .await?;

        let grant = grant.unwrap_or(XpGrant {
            new_total_xp: profile.total_xp,
            new_level: profile.current_level,
            leveled_up: false,
        });

        info!(
            user_id = %user_id,
            xp = summary.xp_gained,
            eligible = summary.eligible_count,
            leveled_up = grant.leveled_up,
            "music sync complete"
        );

        Ok(MusicSyncReport {
            xp_gained: summary.xp_gained,
            eligible_count: summary.eligible_count,
            total_xp: grant.new_total_xp,
            new_level: grant.new_level,
            leveled_up: grant.leveled_up,
            cursor_ms: profile.music_sync_cursor_ms,
        })
    }
}
