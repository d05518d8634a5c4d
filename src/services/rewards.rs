// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile lifecycle and reward application.
//!
//! Every grant or spend in this module goes through a Firestore
//! transaction, with a reward log entry written in the same commit. The
//! once-per-day bookkeeping (study cap rollover, streak evaluation) runs
//! lazily on the first profile access of the day.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::db::firestore::{FirestoreDb, PurchaseOutcome};
use crate::error::{AppError, Result};
use crate::models::achievement::Achievement;
use crate::models::profile::{Profile, StreakOutcome, XpGrant};
use crate::models::reward::{RewardAction, RewardLogEntry, RewardSource};
use crate::models::token::PROVIDER_STRAVA;

/// Outcome of a recorded study session.
#[derive(Debug, Clone)]
pub struct StudyOutcome {
    pub grant: XpGrant,
    pub xp_awarded: u64,
    pub remaining_today: u32,
    pub profile: Profile,
}

#[derive(Clone)]
pub struct RewardService {
    db: FirestoreDb,
}

impl RewardService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// The user's profile with today's bookkeeping settled: study cap
    /// rolled over, streak evaluated, and any newly earned achievements
    /// unlocked. Creates the profile on first access. Returns the profile
    /// alongside whatever this load unlocked.
    pub async fn load_profile(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<(Profile, Vec<Achievement>)> {
        let (profile, _) = self
            .db
            .update_profile_atomic(user_id, None, |profile| {
                let rolled = profile.apply_daily_rollover(today);
                let streak = profile.evaluate_streak(today);
                if rolled || streak != StreakOutcome::Unchanged {
                    Ok(Some(()))
                } else {
                    Ok(None)
                }
            })
            .await?;

        let newly = self.unlock_earned_achievements(user_id, &profile).await?;
        if newly.is_empty() {
            return Ok((profile, newly));
        }

        // Achievement gold landed after our read; serve the updated figures.
        let profile = self
            .db
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))?;
        Ok((profile, newly))
    }

    /// Unlocks every achievement the profile now satisfies, granting its
    /// gold. Idempotent: the unlock row's document id makes a second unlock
    /// a no-op. Returns what was newly unlocked.
    pub async fn unlock_earned_achievements(
        &self,
        user_id: &str,
        profile: &Profile,
    ) -> Result<Vec<Achievement>> {
        let catalog = self.db.list_achievements().await?;
        if catalog.is_empty() {
            return Ok(Vec::new());
        }

        let unlocked: HashSet<String> = self
            .db
            .list_user_achievements(user_id)
            .await?
            .into_iter()
            .map(|u| u.achievement_id)
            .collect();
        let fitness_connected = self
            .db
            .get_provider_token(user_id, PROVIDER_STRAVA)
            .await?
            .is_some();

        let mut newly = Vec::new();
        for achievement in catalog {
            if unlocked.contains(&achievement.id)
                || !achievement.is_met(profile, fitness_connected)
            {
                continue;
            }
            if self
                .db
                .unlock_achievement_atomic(user_id, &achievement, Utc::now())
                .await?
            {
                info!(
                    user_id = %user_id,
                    achievement_id = %achievement.id,
                    gold = achievement.gold_reward,
                    "achievement unlocked"
                );
                newly.push(achievement);
            }
        }

        Ok(newly)
    }

    /// Records a study session, granting XP against the daily cap.
    ///
    /// The cap is all-or-nothing: a session that would cross it is rejected
    /// whole so the user can pick a duration that still fits.
    pub async fn add_study_session(
        &self,
        user_id: &str,
        minutes: u32,
        today: NaiveDate,
    ) -> Result<StudyOutcome> {
        let source = RewardSource::Study { minutes };
        let xp_amount = source.intrinsic_xp();
        // Saturating: an oversized session must fail the cap check, not
        // wrap under it.
        let session_xp = u32::try_from(xp_amount).unwrap_or(u32::MAX);
        let log = RewardLogEntry::new(
            user_id,
            RewardAction::StudySession,
            xp_amount,
            0,
            format!("Study session: {} min", minutes),
            Utc::now(),
        );

        let (profile, grant) = self
            .db
            .update_profile_atomic(user_id, Some(&log), |profile| {
                profile.apply_daily_rollover(today);
                profile.evaluate_streak(today);
                match profile.apply_study_xp(session_xp, today) {
                    Ok(grant) => Ok(Some(grant)),
                    Err(cap) => Err(AppError::Validation(format!(
                        "daily study cap reached: requested {} XP with {} XP remaining",
                        cap.requested_xp, cap.remaining_xp
                    ))),
                }
            })
            .await?;

        // The closure always grants or errors; the fallback only restates
        // the committed profile.
        let grant = grant.unwrap_or(XpGrant {
            new_total_xp: profile.total_xp,
            new_level: profile.current_level,
            leveled_up: false,
        });

        info!(
            user_id = %user_id,
            minutes,
            xp = xp_amount,
            leveled_up = grant.leveled_up,
            "study session recorded"
        );

        Ok(StudyOutcome {
            grant,
            xp_awarded: xp_amount,
            remaining_today: profile.study_remaining_today(today),
            profile,
        })
    }

    /// Buys a shop item: level gate, balance check, gold deduction, and the
    /// inventory row all settle in one transaction.
    pub async fn purchase_item(&self, user_id: &str, item_id: &str) -> Result<PurchaseOutcome> {
        let item = self
            .db
            .get_shop_item(item_id)
            .await?
            .filter(|item| item.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Shop item {}", item_id)))?;

        let outcome = self.db.purchase_item_atomic(user_id, &item, Utc::now()).await?;

        info!(
            user_id = %user_id,
            item_id = %item_id,
            price = item.price,
            "shop item purchased"
        );
        Ok(outcome)
    }

    /// Reward log page, newest first.
    pub async fn reward_history(
        &self,
        user_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<RewardLogEntry>> {
        self.db.list_reward_log(user_id, limit, before).await
    }
}
