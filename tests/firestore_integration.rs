// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for the Firestore layer.
//!
//! These tests require the Firestore emulator to be running:
//! `FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test`
//!
//! Each test works against its own generated user ID, so suites can share
//! one emulator instance.

use chrono::Utc;
use rankquest::error::AppError;
use rankquest::models::reward::{RewardAction, RewardLogEntry};
use rankquest::models::token::{ProviderToken, PROVIDER_SPOTIFY, PROVIDER_STRAVA};
use rankquest::services::CooldownTracker;

mod common;
use common::{test_db, unique_user_id};

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_profile_created_on_first_grant() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("profile-create");

    // Initially, profile should not exist
    let before = db.get_profile(&user_id).await.unwrap();
    assert!(before.is_none(), "Profile should not exist before creation");

    // First grant writes the profile document
    let (profile, grant) = db
        .update_profile_atomic(&user_id, None, |profile| Ok(Some(profile.apply_xp(100))))
        .await
        .unwrap();

    assert_eq!(profile.total_xp, 100);
    assert_eq!(profile.current_level, 2);
    let grant = grant.expect("mutation should report the grant");
    assert!(grant.leveled_up);

    // Verify the stored document matches
    let stored = db
        .get_profile(&user_id)
        .await
        .unwrap()
        .expect("Profile should exist after first grant");
    assert_eq!(stored.total_xp, 100);
    assert_eq!(stored.current_level, 2);
    assert_eq!(stored.user_id, user_id);
    assert!(!stored.updated_at.is_empty());

    println!("✓ Profile created on first grant: user_id={}", user_id);
}

#[tokio::test]
async fn test_grant_and_ledger_commit_together() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("ledger");

    let log = RewardLogEntry::new(
        &user_id,
        RewardAction::StudySession,
        75,
        0,
        "Study session: 25 min",
        Utc::now(),
    );
    db.update_profile_atomic(&user_id, Some(&log), |profile| {
        Ok(Some(profile.apply_xp(75)))
    })
    .await
    .unwrap();

    let entries = db.list_reward_log(&user_id, 10, None).await.unwrap();
    assert_eq!(entries.len(), 1, "Exactly one ledger row should exist");
    assert_eq!(entries[0].xp_amount, 75);
    assert_eq!(entries[0].gold_amount, 0);
    assert!(matches!(entries[0].action, RewardAction::StudySession));

    println!("✓ Grant and ledger row committed together");
}

#[tokio::test]
async fn test_rejected_mutation_rolls_back_everything() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("rollback");

    let log = RewardLogEntry::new(
        &user_id,
        RewardAction::StudySession,
        700,
        0,
        "Study session: 100 min",
        Utc::now(),
    );

    let result = db
        .update_profile_atomic::<(), _>(&user_id, Some(&log), |_| {
            Err(AppError::Validation("domain rule said no".to_string()))
        })
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Neither the profile nor the ledger row may exist
    assert!(db.get_profile(&user_id).await.unwrap().is_none());
    assert!(db
        .list_reward_log(&user_id, 10, None)
        .await
        .unwrap()
        .is_empty());

    println!("✓ Rejected mutation left no trace");
}

#[tokio::test]
async fn test_noop_mutation_writes_nothing() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("noop");

    // Seed a profile
    db.update_profile_atomic(&user_id, None, |profile| Ok(Some(profile.apply_xp(50))))
        .await
        .unwrap();
    let seeded = db.get_profile(&user_id).await.unwrap().unwrap();

    // A mutation that declines to change anything must not even bump
    // updated_at.
    let (returned, outcome) = db
        .update_profile_atomic::<(), _>(&user_id, None, |_| Ok(None))
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(returned.total_xp, 50);

    let after = db.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(after.updated_at, seeded.updated_at);

    println!("✓ No-op mutation left the document untouched");
}

#[tokio::test]
async fn test_user_id_with_special_characters() {
    require_emulator!();

    let db = test_db().await;
    // Slashes would break Firestore document paths without encoding.
    let user_id = format!("auth0|user/{}@example.com", unique_user_id("x"));

    db.update_profile_atomic(&user_id, None, |profile| Ok(Some(profile.apply_xp(10))))
        .await
        .unwrap();

    let stored = db
        .get_profile(&user_id)
        .await
        .unwrap()
        .expect("Profile should round-trip for encoded IDs");
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.total_xp, 10);

    println!("✓ Special-character user ID round-tripped");
}

// ═══════════════════════════════════════════════════════════════════════════
// PROVIDER TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_provider_token_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("token");

    let token = ProviderToken {
        user_id: user_id.clone(),
        provider: PROVIDER_STRAVA.to_string(),
        access_token: "access-abc".to_string(),
        refresh_token: "refresh-def".to_string(),
        expires_at: "2026-09-01T00:00:00+00:00".to_string(),
        scopes: vec!["activity:read".to_string()],
        connected_at: Utc::now().to_rfc3339(),
    };
    db.store_provider_token(&token).await.unwrap();

    let fetched = db
        .get_provider_token(&user_id, PROVIDER_STRAVA)
        .await
        .unwrap()
        .expect("Stored token should be readable");
    assert_eq!(fetched.access_token, "access-abc");
    assert_eq!(fetched.refresh_token, "refresh-def");
    assert_eq!(fetched.scopes, vec!["activity:read".to_string()]);

    // The other provider's slot stays empty
    let other = db
        .get_provider_token(&user_id, PROVIDER_SPOTIFY)
        .await
        .unwrap();
    assert!(other.is_none());

    println!("✓ Provider token round-tripped: user_id={}", user_id);
}

#[tokio::test]
async fn test_provider_token_overwritten_on_refresh() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("token-refresh");

    let mut token = ProviderToken {
        user_id: user_id.clone(),
        provider: PROVIDER_SPOTIFY.to_string(),
        access_token: "old-access".to_string(),
        refresh_token: "old-refresh".to_string(),
        expires_at: "2026-08-25T00:00:00+00:00".to_string(),
        scopes: vec![],
        connected_at: Utc::now().to_rfc3339(),
    };
    db.store_provider_token(&token).await.unwrap();

    token.access_token = "new-access".to_string();
    token.expires_at = "2026-08-26T00:00:00+00:00".to_string();
    db.store_provider_token(&token).await.unwrap();

    let fetched = db
        .get_provider_token(&user_id, PROVIDER_SPOTIFY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.access_token, "new-access");
    assert_eq!(fetched.refresh_token, "old-refresh");

    println!("✓ Token refresh overwrote the stored credential");
}

// ═══════════════════════════════════════════════════════════════════════════
// COOLDOWN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_cooldown_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("cooldown");
    let expires_at_ms = Utc::now().timestamp_millis() + 60_000;

    db.set_cooldown(&user_id, "fitness_sync", expires_at_ms)
        .await
        .unwrap();
    let stored = db.get_cooldown(&user_id, "fitness_sync").await.unwrap();
    assert_eq!(stored, Some(expires_at_ms));

    db.clear_cooldown(&user_id, "fitness_sync").await.unwrap();
    let cleared = db.get_cooldown(&user_id, "fitness_sync").await.unwrap();
    assert!(cleared.is_none());

    println!("✓ Cooldown round-tripped: user_id={}", user_id);
}

#[tokio::test]
async fn test_elapsed_cooldown_deleted_on_read() {
    require_emulator!();

    let db = test_db().await;
    let tracker = CooldownTracker::new(db.clone());
    let user_id = unique_user_id("cooldown-elapsed");

    // A window that expired a minute ago
    let past_ms = Utc::now().timestamp_millis() - 60_000;
    db.set_cooldown(&user_id, "fitness_sync", past_ms)
        .await
        .unwrap();

    let remaining = tracker.fitness_sync_remaining(&user_id).await.unwrap();
    assert_eq!(remaining, 0);

    // Reading the elapsed window removed the document
    let after = db.get_cooldown(&user_id, "fitness_sync").await.unwrap();
    assert!(after.is_none(), "Elapsed window should be deleted on read");

    println!("✓ Elapsed cooldown deleted on read");
}

#[tokio::test]
async fn test_fresh_cooldown_reports_remaining() {
    require_emulator!();

    let db = test_db().await;
    let tracker = CooldownTracker::new(db);
    let user_id = unique_user_id("cooldown-fresh");

    tracker.start_fitness_sync(&user_id).await.unwrap();
    let remaining = tracker.fitness_sync_remaining(&user_id).await.unwrap();

    assert!(remaining > 0, "Fresh window should have time left");
    assert!(remaining <= 900, "Window never exceeds 15 minutes");

    println!("✓ Fresh cooldown reports {}s remaining", remaining);
}

// ═══════════════════════════════════════════════════════════════════════════
// REWARD LOG PAGINATION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_reward_log_pages_newest_first() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id("paging");

    // Five grants, one ledger row each; commits give them distinct
    // microsecond timestamps.
    for i in 1..=5u64 {
        let log = RewardLogEntry::new(
            &user_id,
            RewardAction::StudySession,
            i * 7,
            0,
            format!("Study session: {} min", i),
            Utc::now(),
        );
        db.update_profile_atomic(&user_id, Some(&log), |profile| {
            Ok(Some(profile.apply_xp(i * 7)))
        })
        .await
        .unwrap();
    }

    // First page: the two newest entries
    let page1 = db.list_reward_log(&user_id, 2, None).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[0].xp_amount, 35);
    assert_eq!(page1[1].xp_amount, 28);
    assert!(page1[0].created_at > page1[1].created_at);

    // Second page: strictly older than the first page's tail
    let page2 = db
        .list_reward_log(&user_id, 2, Some(&page1[1].created_at))
        .await
        .unwrap();
    assert_eq!(page2.len(), 2);
    assert_eq!(page2[0].xp_amount, 21);
    assert_eq!(page2[1].xp_amount, 14);
    assert!(page2[0].created_at < page1[1].created_at);

    // Final page: one entry left
    let page3 = db
        .list_reward_log(&user_id, 2, Some(&page2[1].created_at))
        .await
        .unwrap();
    assert_eq!(page3.len(), 1);
    assert_eq!(page3[0].xp_amount, 7);

    println!("✓ Reward log paginated newest-first: user_id={}", user_id);
}
