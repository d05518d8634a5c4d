// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study session and streak integration tests.
//!
//! These tests require the Firestore emulator to be running:
//! `FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test`
//!
//! Dates are passed explicitly, so "tomorrow" never depends on the clock.

use chrono::NaiveDate;
use rankquest::error::AppError;
use rankquest::services::RewardService;

mod common;
use common::{test_db, unique_user_id};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
}

#[tokio::test]
async fn test_study_session_grants_xp() {
    require_emulator!();

    let db = test_db().await;
    let rewards = RewardService::new(db.clone());
    let user_id = unique_user_id("study");

    let outcome = rewards
        .add_study_session(&user_id, 25, day(3))
        .await
        .unwrap();

    // 25 minutes at 7 XP per minute
    assert_eq!(outcome.xp_awarded, 175);
    assert_eq!(outcome.grant.new_total_xp, 175);
    assert!(outcome.grant.leveled_up, "175 XP crosses the 50 XP threshold");
    assert_eq!(outcome.remaining_today, 1500 - 175);
    assert_eq!(outcome.profile.today_study_xp, 175);
    assert_eq!(outcome.profile.last_study_date, Some(day(3)));

    let entries = db.list_reward_log(&user_id, 10, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].xp_amount, 175);

    println!("✓ Study session granted 175 XP: user_id={}", user_id);
}

#[tokio::test]
async fn test_daily_cap_is_all_or_nothing() {
    require_emulator!();

    let db = test_db().await;
    let rewards = RewardService::new(db.clone());
    let user_id = unique_user_id("study-cap");

    // 214 minutes = 1498 XP, two short of the 1500 cap
    let outcome = rewards
        .add_study_session(&user_id, 214, day(3))
        .await
        .unwrap();
    assert_eq!(outcome.xp_awarded, 1498);
    assert_eq!(outcome.remaining_today, 2);

    // One more minute is 7 XP; it does not fit and is rejected whole
    let result = rewards.add_study_session(&user_id, 1, day(3)).await;
    let err = result.expect_err("session crossing the cap must be rejected");
    match err {
        AppError::Validation(msg) => {
            assert!(msg.contains("daily study cap"), "unexpected message: {}", msg)
        }
        other => panic!("Expected validation rejection, got {:?}", other),
    }

    // No partial grant, no stray ledger row
    let profile = db.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(profile.today_study_xp, 1498);
    assert_eq!(profile.total_xp, 1498);
    let entries = db.list_reward_log(&user_id, 10, None).await.unwrap();
    assert_eq!(entries.len(), 1);

    println!("✓ Cap rejection left the day at 1498 XP");
}

#[tokio::test]
async fn test_cap_resets_on_next_day() {
    require_emulator!();

    let db = test_db().await;
    let rewards = RewardService::new(db.clone());
    let user_id = unique_user_id("study-rollover");

    rewards
        .add_study_session(&user_id, 214, day(3))
        .await
        .unwrap();

    // Next day the counter starts over; lifetime XP keeps accumulating
    let outcome = rewards
        .add_study_session(&user_id, 25, day(4))
        .await
        .unwrap();
    assert_eq!(outcome.xp_awarded, 175);
    assert_eq!(outcome.profile.today_study_xp, 175);
    assert_eq!(outcome.profile.last_study_date, Some(day(4)));
    assert_eq!(outcome.profile.total_xp, 1498 + 175);
    assert_eq!(outcome.remaining_today, 1500 - 175);

    println!("✓ Study cap reset on rollover");
}

#[tokio::test]
async fn test_streak_extends_on_consecutive_days() {
    require_emulator!();

    let db = test_db().await;
    let rewards = RewardService::new(db);
    let user_id = unique_user_id("streak");

    let (profile, _) = rewards.load_profile(&user_id, day(3)).await.unwrap();
    assert_eq!(profile.streak_count, 1, "First visit opens the streak");

    // Revisiting the same day changes nothing
    let (profile, _) = rewards.load_profile(&user_id, day(3)).await.unwrap();
    assert_eq!(profile.streak_count, 1);

    let (profile, _) = rewards.load_profile(&user_id, day(4)).await.unwrap();
    assert_eq!(profile.streak_count, 2);

    let (profile, _) = rewards.load_profile(&user_id, day(5)).await.unwrap();
    assert_eq!(profile.streak_count, 3);

    println!("✓ Streak extended to {}", profile.streak_count);
}

#[tokio::test]
async fn test_streak_resets_after_missed_day() {
    require_emulator!();

    let db = test_db().await;
    let rewards = RewardService::new(db);
    let user_id = unique_user_id("streak-reset");

    rewards.load_profile(&user_id, day(3)).await.unwrap();
    let (profile, _) = rewards.load_profile(&user_id, day(4)).await.unwrap();
    assert_eq!(profile.streak_count, 2);

    // Day 5 is skipped; day 6 starts a fresh streak of one
    let (profile, _) = rewards.load_profile(&user_id, day(6)).await.unwrap();
    assert_eq!(profile.streak_count, 1, "A gap resets the streak");

    println!("✓ Streak reset after missed day");
}
