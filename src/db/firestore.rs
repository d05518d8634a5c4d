// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (XP, gold, streak, sync cursors)
//! - Provider tokens (OAuth credentials)
//! - Missions (catalog, daily selection, assignments)
//! - Reward log, shop, inventory, and achievements
//!
//! Every grant and spend goes through a transaction that reads the profile
//! with transaction consistency, so concurrent updates abort at commit
//! instead of overwriting each other. Aborted commits surface as
//! [`AppError::Conflict`] and are retried once.

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::db::collections;
use crate::error::AppError;
use crate::models::achievement::{Achievement, UserAchievement};
use crate::models::mission::{DailySelection, MissionAssignment, MissionStatus, MissionTemplate};
use crate::models::profile::{Profile, XpGrant};
use crate::models::reward::{RewardAction, RewardLogEntry};
use crate::models::shop::{InventoryItem, ShopItem};
use crate::models::token::ProviderToken;
use crate::time_utils::format_utc_rfc3339;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Outcome of completing a mission assignment.
#[derive(Debug, Clone)]
pub struct MissionCompletion {
    /// True when the assignment was already settled; the rest of the
    /// fields then restate existing state and nothing was granted.
    pub already_completed: bool,
    pub xp_awarded: u64,
    pub gold_awarded: u64,
    pub grant: XpGrant,
    pub profile: Profile,
}

/// Outcome of a shop purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub item: InventoryItem,
    pub gold_spent: u64,
    pub profile: Profile,
}

/// Cooldown document, one per user per rate-limited operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CooldownDoc {
    user_id: String,
    key: String,
    expires_at_ms: i64,
    started_at: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn profile_doc_id(user_id: &str) -> String {
    urlencoding::encode(user_id).into_owned()
}

fn cooldown_doc_id(user_id: &str, key: &str) -> String {
    format!("{}_{}", urlencoding::encode(user_id), key)
}

/// Commit failures from read contention come back as ABORTED; those are
/// retryable conflicts, everything else is a database fault.
fn classify_commit_error(e: firestore::errors::FirestoreError) -> AppError {
    let msg = e.to_string();
    if msg.to_lowercase().contains("aborted") {
        AppError::Conflict("concurrent profile update".to_string())
    } else {
        AppError::Database(format!("Transaction commit failed: {}", msg))
    }
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a user's profile.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&profile_doc_id(user_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply a mutation to a profile inside a transaction, optionally
    /// writing a reward log entry in the same commit.
    ///
    /// The closure receives the current profile (a fresh one on first
    /// access) and returns `Ok(Some(t))` to commit, `Ok(None)` to skip the
    /// write entirely, or an error to roll back. It must leave the profile
    /// untouched when returning `Ok(None)`, since that state is handed back
    /// to the caller as authoritative.
    ///
    /// A commit aborted by a concurrent writer is retried once with fresh
    /// state before surfacing as [`AppError::Conflict`].
    pub async fn update_profile_atomic<T, F>(
        &self,
        user_id: &str,
        log: Option<&RewardLogEntry>,
        mutate: F,
    ) -> Result<(Profile, Option<T>), AppError>
    where
        F: Fn(&mut Profile) -> Result<Option<T>, AppError>,
    {
        match self.update_profile_atomic_once(user_id, log, &mutate).await {
            Err(AppError::Conflict(_)) => {
                tracing::debug!(user_id = %user_id, "Profile transaction aborted, retrying once");
                self.update_profile_atomic_once(user_id, log, &mutate).await
            }
            other => other,
        }
    }

    async fn update_profile_atomic_once<T, F>(
        &self,
        user_id: &str,
        log: Option<&RewardLogEntry>,
        mutate: &F,
    ) -> Result<(Profile, Option<T>), AppError>
    where
        F: Fn(&mut Profile) -> Result<Option<T>, AppError>,
    {
        let client = self.get_client()?;
        let doc_id = profile_doc_id(user_id);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read with transaction consistency so the profile joins the
        // read set and a concurrent grant aborts this commit.
        let txn_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let current: Option<Profile> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read profile in transaction: {}", e))
            })?;

        let mut profile = current.unwrap_or_else(|| Profile::new(user_id, Utc::now()));

        let outcome = match mutate(&mut profile) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        if outcome.is_none() {
            let _ = transaction.rollback().await;
            return Ok((profile, None));
        }

        profile.updated_at = format_utc_rfc3339(Utc::now());

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&doc_id)
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        if let Some(entry) = log {
            client
                .fluent()
                .update()
                .in_col(collections::REWARD_LOG)
                .document_id(&entry.entry_id)
                .object(entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add reward log to transaction: {}", e))
                })?;
        }

        transaction.commit().await.map_err(classify_commit_error)?;

        Ok((profile, outcome))
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get a stored provider credential.
    pub async fn get_provider_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<ProviderToken>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROVIDER_TOKENS)
            .obj()
            .one(&ProviderToken::doc_id(user_id, provider))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a provider credential (written on connect and on refresh).
    pub async fn store_provider_token(&self, token: &ProviderToken) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROVIDER_TOKENS)
            .document_id(ProviderToken::doc_id(&token.user_id, &token.provider))
            .object(token)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Mission Catalog Operations ──────────────────────────────

    /// The full mission catalog, active or not. Selection filters on
    /// `is_active`; offer rendering wants deactivated entries too.
    pub async fn list_missions(&self) -> Result<Vec<MissionTemplate>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MISSIONS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a mission template by id.
    pub async fn get_mission(&self, mission_id: &str) -> Result<Option<MissionTemplate>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MISSIONS)
            .obj()
            .one(mission_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a catalog entry (admin and test seeding).
    pub async fn upsert_mission(&self, mission: &MissionTemplate) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MISSIONS)
            .document_id(&mission.id)
            .object(mission)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Seed multiple catalog entries with bounded concurrency.
    pub async fn upsert_missions(&self, missions: &[MissionTemplate]) -> Result<(), AppError> {
        stream::iter(missions.to_vec())
            .map(|mission| async move { self.upsert_mission(&mission).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    // ─── Mission Assignment Operations ───────────────────────────

    /// A user's mission assignments for one date.
    pub async fn list_assignments_for_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<MissionAssignment>, AppError> {
        let user_id = user_id.to_string();
        let date = date.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::MISSION_ASSIGNMENTS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("assigned_date").eq(date.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically create a day's assignments behind a selection marker.
    ///
    /// The marker document at `{user}_{date}` is read inside the
    /// transaction; if it already exists (or a racing instance commits it
    /// first) nothing is written and this returns `false`. The caller then
    /// reads back whatever the winner assigned.
    pub async fn create_daily_assignments_atomic(
        &self,
        user_id: &str,
        date: NaiveDate,
        assignments: &[MissionAssignment],
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;
        let marker_id = DailySelection::doc_id(user_id, date);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let existing: Option<DailySelection> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::MISSION_DAYS)
            .obj()
            .one(&marker_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read selection marker: {}", e))
            })?;

        if existing.is_some() {
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        let marker = DailySelection {
            user_id: user_id.to_string(),
            assigned_date: date,
            mission_ids: assignments.iter().map(|a| a.mission_id.clone()).collect(),
            created_at: format_utc_rfc3339(Utc::now()),
        };

        client
            .fluent()
            .update()
            .in_col(collections::MISSION_DAYS)
            .document_id(&marker_id)
            .object(&marker)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add marker to transaction: {}", e))
            })?;

        for assignment in assignments {
            let doc_id = MissionAssignment::doc_id(
                &assignment.user_id,
                assignment.assigned_date,
                &assignment.mission_id,
            );
            client
                .fluent()
                .update()
                .in_col(collections::MISSION_ASSIGNMENTS)
                .document_id(&doc_id)
                .object(assignment)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add assignment to transaction: {}",
                        e
                    ))
                })?;
        }

        match transaction.commit().await.map_err(classify_commit_error) {
            Ok(_) => Ok(true),
            // Lost the marker race to another instance.
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Atomically settle a mission completion: mark the assignment, apply
    /// the grant to the profile, and append the reward log entry.
    ///
    /// `grant_fn` prices the reward against the profile as read inside the
    /// transaction and returns `(xp, gold, description)`. An assignment
    /// that is already completed settles as a no-op with
    /// `already_completed` set; an expired one is rejected.
    pub async fn complete_mission_atomic<F>(
        &self,
        user_id: &str,
        assignment_id: &str,
        today: NaiveDate,
        grant_fn: F,
    ) -> Result<MissionCompletion, AppError>
    where
        F: Fn(&Profile) -> (u64, u64, String),
    {
        match self
            .complete_mission_atomic_once(user_id, assignment_id, today, &grant_fn)
            .await
        {
            Err(AppError::Conflict(_)) => {
                tracing::debug!(
                    user_id = %user_id,
                    assignment_id = %assignment_id,
                    "Completion transaction aborted, retrying once"
                );
                self.complete_mission_atomic_once(user_id, assignment_id, today, &grant_fn)
                    .await
            }
            other => other,
        }
    }

    async fn complete_mission_atomic_once<F>(
        &self,
        user_id: &str,
        assignment_id: &str,
        today: NaiveDate,
        grant_fn: &F,
    ) -> Result<MissionCompletion, AppError>
    where
        F: Fn(&Profile) -> (u64, u64, String),
    {
        let client = self.get_client()?;
        let now = Utc::now();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let assignment: Option<MissionAssignment> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::MISSION_ASSIGNMENTS)
            .obj()
            .one(assignment_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read assignment in transaction: {}", e))
            })?;

        let current_profile: Option<Profile> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&profile_doc_id(user_id))
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read profile in transaction: {}", e))
            })?;

        let mut assignment = match assignment {
            // Ownership mismatch reads the same as absence.
            Some(a) if a.user_id == user_id => a,
            _ => {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!(
                    "Mission assignment {}",
                    assignment_id
                )));
            }
        };

        let mut profile = current_profile.unwrap_or_else(|| Profile::new(user_id, now));

        match assignment.effective_status(today) {
            MissionStatus::Completed => {
                let _ = transaction.rollback().await;
                return Ok(MissionCompletion {
                    already_completed: true,
                    xp_awarded: 0,
                    gold_awarded: 0,
                    grant: XpGrant {
                        new_total_xp: profile.total_xp,
                        new_level: profile.current_level,
                        leveled_up: false,
                    },
                    profile,
                });
            }
            MissionStatus::Expired => {
                let _ = transaction.rollback().await;
                return Err(AppError::Validation(
                    "mission assignment has expired".to_string(),
                ));
            }
            MissionStatus::Pending => {}
        }

        let (xp, gold, description) = grant_fn(&profile);

        let grant = profile.apply_xp(xp);
        profile.add_gold(gold);
        profile.updated_at = format_utc_rfc3339(now);

        assignment.status = MissionStatus::Completed;
        assignment.completed_at = Some(format_utc_rfc3339(now));

        let log = RewardLogEntry::new(
            user_id,
            RewardAction::MissionCompleted,
            xp,
            gold as i64,
            description,
            now,
        );

        client
            .fluent()
            .update()
            .in_col(collections::MISSION_ASSIGNMENTS)
            .document_id(assignment_id)
            .object(&assignment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add assignment to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile_doc_id(user_id))
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::REWARD_LOG)
            .document_id(&log.entry_id)
            .object(&log)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add reward log to transaction: {}", e))
            })?;

        transaction.commit().await.map_err(classify_commit_error)?;

        tracing::info!(
            user_id = %user_id,
            assignment_id = %assignment_id,
            xp,
            gold,
            "Mission completed atomically"
        );

        Ok(MissionCompletion {
            already_completed: false,
            xp_awarded: xp,
            gold_awarded: gold,
            grant,
            profile,
        })
    }

    // ─── Cooldown Operations ─────────────────────────────────────

    /// Expiry (Unix ms) of a cooldown window, if one is stored.
    pub async fn get_cooldown(&self, user_id: &str, key: &str) -> Result<Option<i64>, AppError> {
        let doc: Option<CooldownDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COOLDOWNS)
            .obj()
            .one(&cooldown_doc_id(user_id, key))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(doc.map(|d| d.expires_at_ms))
    }

    /// Store a cooldown window, replacing any previous one.
    pub async fn set_cooldown(
        &self,
        user_id: &str,
        key: &str,
        expires_at_ms: i64,
    ) -> Result<(), AppError> {
        let doc = CooldownDoc {
            user_id: user_id.to_string(),
            key: key.to_string(),
            expires_at_ms,
            started_at: format_utc_rfc3339(Utc::now()),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COOLDOWNS)
            .document_id(cooldown_doc_id(user_id, key))
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an elapsed cooldown window.
    pub async fn clear_cooldown(&self, user_id: &str, key: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::COOLDOWNS)
            .document_id(cooldown_doc_id(user_id, key))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Reward Log Operations ───────────────────────────────────

    /// Reward log entries for a user, newest first.
    ///
    /// `before` is an exclusive `created_at` bound; entry timestamps are
    /// fixed-width, so the lexicographic comparison is chronological.
    pub async fn list_reward_log(
        &self,
        user_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<RewardLogEntry>, AppError> {
        let user_id = user_id.to_string();

        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::REWARD_LOG);

        let query = if let Some(before) = before {
            let before = before.to_string();
            query.filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("created_at").less_than(before.clone()),
                ])
            })
        } else {
            query.filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
        };

        query
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Shop Operations ─────────────────────────────────────────

    /// The full shop catalog, active or not. The storefront filters on
    /// `is_active`; inventory rendering wants delisted entries too.
    pub async fn list_shop_items(&self) -> Result<Vec<ShopItem>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SHOP_ITEMS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a shop item by id.
    pub async fn get_shop_item(&self, item_id: &str) -> Result<Option<ShopItem>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SHOP_ITEMS)
            .obj()
            .one(item_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a shop item (admin and test seeding).
    pub async fn upsert_shop_item(&self, item: &ShopItem) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SHOP_ITEMS)
            .document_id(&item.id)
            .object(item)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Everything a user owns.
    pub async fn list_inventory(&self, user_id: &str) -> Result<Vec<InventoryItem>, AppError> {
        let user_id = user_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::INVENTORY)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "purchased_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically buy a shop item: the level gate and balance check run
    /// against the profile as read inside the transaction, and the gold
    /// deduction, inventory row, and log entry commit together.
    pub async fn purchase_item_atomic(
        &self,
        user_id: &str,
        item: &ShopItem,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, AppError> {
        match self.purchase_item_atomic_once(user_id, item, now).await {
            Err(AppError::Conflict(_)) => {
                tracing::debug!(user_id = %user_id, "Purchase transaction aborted, retrying once");
                self.purchase_item_atomic_once(user_id, item, now).await
            }
            other => other,
        }
    }

    async fn purchase_item_atomic_once(
        &self,
        user_id: &str,
        item: &ShopItem,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let current: Option<Profile> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&profile_doc_id(user_id))
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read profile in transaction: {}", e))
            })?;

        let mut profile = current.unwrap_or_else(|| Profile::new(user_id, now));

        if profile.current_level < item.min_level {
            let _ = transaction.rollback().await;
            return Err(AppError::Validation(format!(
                "level {} required to buy {}",
                item.min_level, item.name
            )));
        }

        if !profile.try_spend_gold(item.price) {
            let _ = transaction.rollback().await;
            return Err(AppError::Validation(format!(
                "not enough gold: {} costs {}, balance is {}",
                item.name, item.price, profile.gold
            )));
        }
        profile.updated_at = format_utc_rfc3339(now);

        let owned = InventoryItem::new(user_id, item, now);
        let inventory_doc_id = InventoryItem::doc_id(user_id, &item.id, now);

        let log = RewardLogEntry::new(
            user_id,
            RewardAction::ShopPurchase,
            0,
            -(item.price as i64),
            format!("Purchased {}", item.name),
            now,
        );

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile_doc_id(user_id))
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::INVENTORY)
            .document_id(&inventory_doc_id)
            .object(&owned)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add inventory to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::REWARD_LOG)
            .document_id(&log.entry_id)
            .object(&log)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add reward log to transaction: {}", e))
            })?;

        transaction.commit().await.map_err(classify_commit_error)?;

        Ok(PurchaseOutcome {
            item: owned,
            gold_spent: item.price,
            profile,
        })
    }

    // ─── Achievement Operations ──────────────────────────────────

    /// The achievement catalog.
    pub async fn list_achievements(&self) -> Result<Vec<Achievement>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACHIEVEMENTS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update an achievement (admin and test seeding).
    pub async fn upsert_achievement(&self, achievement: &Achievement) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACHIEVEMENTS)
            .document_id(&achievement.id)
            .object(achievement)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Everything a user has unlocked.
    pub async fn list_user_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAchievement>, AppError> {
        let user_id = user_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::USER_ACHIEVEMENTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically unlock an achievement and grant its gold. Returns `false`
    /// without writing when the unlock row already exists, so each
    /// achievement pays out exactly once.
    pub async fn unlock_achievement_atomic(
        &self,
        user_id: &str,
        achievement: &Achievement,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;
        let unlock_id = UserAchievement::doc_id(user_id, &achievement.id);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let existing: Option<UserAchievement> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::USER_ACHIEVEMENTS)
            .obj()
            .one(&unlock_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read unlock in transaction: {}", e))
            })?;

        if existing.is_some() {
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        let current: Option<Profile> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&profile_doc_id(user_id))
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read profile in transaction: {}", e))
            })?;

        let mut profile = current.unwrap_or_else(|| Profile::new(user_id, now));
        profile.add_gold(achievement.gold_reward);
        profile.updated_at = format_utc_rfc3339(now);

        let unlock = UserAchievement::new(user_id, &achievement.id, now);
        let log = RewardLogEntry::new(
            user_id,
            RewardAction::AchievementUnlocked,
            0,
            achievement.gold_reward as i64,
            format!("Achievement unlocked: {}", achievement.title),
            now,
        );

        client
            .fluent()
            .update()
            .in_col(collections::USER_ACHIEVEMENTS)
            .document_id(&unlock_id)
            .object(&unlock)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add unlock to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile_doc_id(user_id))
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::REWARD_LOG)
            .document_id(&log.entry_id)
            .object(&log)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add reward log to transaction: {}", e))
            })?;

        match transaction.commit().await.map_err(classify_commit_error) {
            Ok(_) => Ok(true),
            // A concurrent request unlocked it first.
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
