// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod cooldown;
pub mod missions;
pub mod normalizer;
pub mod rewards;
pub mod spotify;
pub mod strava;
pub mod sync;
pub mod tokens;

pub use cooldown::CooldownTracker;
pub use missions::MissionService;
pub use rewards::RewardService;
pub use spotify::SpotifyService;
pub use strava::StravaService;
pub use sync::SyncService;
