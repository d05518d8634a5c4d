// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Shop catalog and per-user inventory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// What a purchasable item does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Display-facing XP bonus fraction (0.10 = +10%). Grants are never
    /// silently multiplied; the boost is surfaced to the UI only.
    XpBoost,
    Cosmetic,
}

/// Catalog entry, administered outside the engine.
///
/// Stored in the `shop_items` collection, keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub price: u64,
    /// Purchase is rejected below this level.
    pub min_level: u32,
    pub effect_type: EffectType,
    pub effect_value: f64,
    /// Hours the effect lasts after purchase; 0 means permanent.
    pub effect_duration_hours: u32,
    pub is_active: bool,
}

/// One owned item.
///
/// Stored in the `inventory` collection; the same catalog item may be owned
/// multiple times (consumable boosts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InventoryItem {
    pub user_id: String,
    pub item_id: String,
    pub purchased_at: String,
    /// When a timed effect lapses; `None` for permanent items.
    pub expires_at: Option<String>,
}

impl InventoryItem {
    pub fn new(user_id: &str, item: &ShopItem, now: DateTime<Utc>) -> Self {
        let expires_at = (item.effect_duration_hours > 0).then(|| {
            (now + chrono::Duration::hours(item.effect_duration_hours as i64)).to_rfc3339()
        });

        Self {
            user_id: user_id.to_string(),
            item_id: item.id.clone(),
            purchased_at: now.to_rfc3339(),
            expires_at,
        }
    }

    pub fn doc_id(user_id: &str, item_id: &str, now: DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}",
            urlencoding::encode(user_id),
            urlencoding::encode(item_id),
            now.timestamp_micros()
        )
    }

    /// Whether a timed effect is still running. Unparseable expiry data
    /// reads as inactive rather than granting an eternal boost.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at.as_deref() {
            None => true,
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|expiry| now < expiry.with_timezone(&Utc))
                .unwrap_or(false),
        }
    }
}
