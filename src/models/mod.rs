// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod achievement;
pub mod mission;
pub mod profile;
pub mod reward;
pub mod shop;
pub mod token;

pub use achievement::{Achievement, RequirementKind, UserAchievement};
pub use mission::{DailySelection, MissionAssignment, MissionStatus, MissionTemplate, MissionType};
pub use profile::{Profile, StreakOutcome, StudyCapExceeded, XpGrant};
pub use reward::{FitnessTrack, RewardAction, RewardLogEntry, RewardSource};
pub use shop::{EffectType, InventoryItem, ShopItem};
pub use token::ProviderToken;
