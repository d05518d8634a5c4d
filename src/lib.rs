// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! RankQuest: gamified progression engine for real-world habits
//!
//! This crate provides the backend API that converts exercise, music
//! listening, and study sessions into XP, gold, levels, ranks, daily
//! missions, and achievements.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod progression;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{MissionService, RewardService, SpotifyService, StravaService, SyncService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub rewards: RewardService,
    pub missions: MissionService,
    pub sync: SyncService,
    pub strava: StravaService,
    pub spotify: SpotifyService,
}
