// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! RankQuest API Server
//!
//! Turns real-world habits (exercise via Strava, listening via Spotify,
//! timed study sessions) into XP, gold, levels, ranks, and daily missions.

use anyhow::Context;
use rankquest::{
    config::Config,
    db::FirestoreDb,
    services::{
        CooldownTracker, MissionService, RewardService, SpotifyService, StravaService,
        SyncService,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(port = config.port, "Starting RankQuest API");

    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .context("connecting to Firestore")?;

    // Token caches and refresh locks are per-provider so a Strava refresh
    // never contends with a Spotify one. Shared across all service clones
    // within this instance.
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
    tracing::info!("Services initialized");

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        rewards,
        missions,
        sync,
        strava,
        spotify,
    });

    let app = rankquest::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(address = %addr, "Accepting connections");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Structured JSON logging, flattened the way Cloud Logging wants it.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rankquest=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
