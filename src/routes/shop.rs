// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shop and inventory routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{EffectType, InventoryItem, ShopItem};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/shop/items", get(list_items))
        .route("/api/shop/items/{item_id}/purchase", post(purchase_item))
        .route("/api/inventory", get(get_inventory))
}

// ─── Catalog ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ShopItemsResponse {
    pub items: Vec<ShopItem>,
}

/// Get the purchasable catalog.
async fn list_items(State(state): State<Arc<AppState>>) -> Result<Json<ShopItemsResponse>> {
    let items = state
        .db
        .list_shop_items()
        .await?
        .into_iter()
        .filter(|item| item.is_active)
        .collect();

    Ok(Json(ShopItemsResponse { items }))
}

// ─── Purchase ────────────────────────────────────────────────

/// Purchase response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PurchaseResponse {
    pub item: InventoryItem,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold_spent: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub gold_remaining: u64,
}

/// Buy a shop item.
///
/// Level gate and balance check run inside the same transaction that
/// deducts the gold, so concurrent purchases cannot overspend.
async fn purchase_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<String>,
) -> Result<Json<PurchaseResponse>> {
    tracing::debug!(user_id = %user.user_id, item_id = %item_id, "Purchase requested");

    let outcome = state.rewards.purchase_item(&user.user_id, &item_id).await?;

    Ok(Json(PurchaseResponse {
        item: outcome.item,
        gold_spent: outcome.gold_spent,
        gold_remaining: outcome.profile.gold,
    }))
}

// ─── Inventory ───────────────────────────────────────────────

/// One owned item joined with its catalog entry.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InventoryEntry {
    pub owned: InventoryItem,
    /// `None` when the catalog entry was deleted outright.
    pub item: Option<ShopItem>,
    /// Whether a timed effect is still running.
    pub active: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InventoryResponse {
    pub items: Vec<InventoryEntry>,
    /// Best running XP-boost fraction, display only. Grants are never
    /// multiplied by this.
    pub active_xp_boost: f64,
}

/// Get everything the user owns, with the best running XP boost.
async fn get_inventory(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InventoryResponse>> {
    let now = Utc::now();
    let owned = state.db.list_inventory(&user.user_id).await?;

    // Join against the full catalog so items delisted after purchase
    // still render.
    let catalog: HashMap<String, ShopItem> = state
        .db
        .list_shop_items()
        .await?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    let items: Vec<InventoryEntry> = owned
        .into_iter()
        .map(|owned| {
            let item = catalog.get(&owned.item_id).cloned();
            let active = owned.is_active(now);
            InventoryEntry {
                owned,
                item,
                active,
            }
        })
        .collect();

    let active_xp_boost = items
        .iter()
        .filter(|entry| entry.active)
        .filter_map(|entry| entry.item.as_ref())
        .filter(|item| item.effect_type == EffectType::XpBoost)
        .map(|item| item.effect_value)
        .fold(0.0_f64, f64::max);

    Ok(Json(InventoryResponse {
        items,
        active_xp_boost,
    }))
}
