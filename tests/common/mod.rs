// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use rankquest::config::Config;
use rankquest::db::FirestoreDb;
use rankquest::routes::create_router;
use rankquest::services::{
    CooldownTracker, MissionService, RewardService, SpotifyService, StravaService, SyncService,
};
use rankquest::AppState;
use std::sync::Arc;

/// True when a Firestore emulator is reachable via the standard env var.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Bail out of an emulator-backed test early when none is running.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  skipping, FIRESTORE_EMULATOR_HOST is not set");
            return;
        }
    };
}

/// Connect to the emulator. Call after `require_emulator!`.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("emulator advertised but not reachable")
}

/// A database handle whose every operation fails; for middleware-layer tests.
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Generate a unique user ID so tests sharing the emulator stay isolated.
#[allow(dead_code)]
pub fn unique_user_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

/// Create a signed session JWT for a test user.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    rankquest::middleware::auth::create_jwt(user_id, signing_key)
        .expect("Failed to create test JWT")
}

/// Create a test app around the given database connection.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app_with_db(db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let config = Config::default();

    let strava = StravaService::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        db.clone(),
        Arc::new(dashmap::DashMap::new()),
        Arc::new(dashmap::DashMap::new()),
    );
    let spotify = SpotifyService::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        db.clone(),
        Arc::new(dashmap::DashMap::new()),
        Arc::new(dashmap::DashMap::new()),
    );

    let cooldowns = CooldownTracker::new(db.clone());
    let rewards = RewardService::new(db.clone());
    let missions = MissionService::new(db.clone());
    let sync = SyncService::new(db.clone(), strava.clone(), spotify.clone(), cooldowns);

    let state = Arc::new(AppState {
        config,
        db,
        rewards,
        missions,
        sync,
        strava,
        spotify,
    });

    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_db(test_db_offline())
}
