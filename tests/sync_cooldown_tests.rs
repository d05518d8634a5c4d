// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync cooldown integration tests.
//!
//! These tests require the Firestore emulator to be running:
//! `FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test`
//!
//! No provider credentials are stored, so every sync fails before any
//! network call; what is under test is the cooldown bookkeeping around
//! that failure.

use chrono::NaiveDate;
use rankquest::error::AppError;

mod common;
use common::{create_test_app_with_db, test_db, unique_user_id};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 12).unwrap()
}

#[tokio::test]
async fn test_fresh_user_has_no_cooldown() {
    require_emulator!();

    let (_, state) = create_test_app_with_db(test_db().await);
    let user_id = unique_user_id("sync-fresh");

    let remaining = state.sync.fitness_cooldown_remaining(&user_id).await.unwrap();
    assert_eq!(remaining, 0);

    println!("✓ Fresh user starts with no cooldown");
}

#[tokio::test]
async fn test_failed_sync_still_burns_cooldown() {
    require_emulator!();

    let (_, state) = create_test_app_with_db(test_db().await);
    let user_id = unique_user_id("sync-burn");

    // Without a stored credential the sync dies at token lookup,
    // after the window was stamped.
    let result = state.sync.sync_fitness(&user_id, today()).await;
    match result {
        Err(AppError::StaleCredential(provider)) => assert_eq!(provider, "strava"),
        other => panic!("Expected stale credential, got {:?}", other),
    }

    let remaining = state.sync.fitness_cooldown_remaining(&user_id).await.unwrap();
    assert!(
        remaining > 0 && remaining <= 900,
        "Failed sync must still spend the window, got {}s",
        remaining
    );

    println!("✓ Failed sync burned the cooldown: {}s left", remaining);
}

#[tokio::test]
async fn test_sync_rejected_while_cooldown_active() {
    require_emulator!();

    let (_, state) = create_test_app_with_db(test_db().await);
    let user_id = unique_user_id("sync-repeat");

    // First attempt stamps the window (and fails on the missing credential)
    let _ = state.sync.sync_fitness(&user_id, today()).await;

    // Second attempt must be turned away before touching the provider
    let result = state.sync.sync_fitness(&user_id, today()).await;
    let err = result.expect_err("second sync inside the window must be rejected");
    match err {
        AppError::Validation(msg) => {
            assert!(msg.contains("cooldown"), "unexpected message: {}", msg)
        }
        other => panic!("Expected validation rejection, got {:?}", other),
    }

    println!("✓ Second sync rejected while window active");
}

#[tokio::test]
async fn test_music_sync_has_no_cooldown() {
    require_emulator!();

    let (_, state) = create_test_app_with_db(test_db().await);
    let user_id = unique_user_id("sync-music");

    // Both attempts fail on the missing credential; neither is ever
    // rejected for rate limiting.
    for _ in 0..2 {
        let result = state.sync.sync_music(&user_id, today()).await;
        match result {
            Err(AppError::StaleCredential(provider)) => assert_eq!(provider, "spotify"),
            other => panic!("Expected stale credential, got {:?}", other),
        }
    }

    println!("✓ Music sync carries no cooldown");
}
