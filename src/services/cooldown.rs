// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistent rate limiting for provider syncs.
//!
//! Cooldowns live in Firestore rather than process memory so a restart or a
//! second instance cannot be used to hammer the provider. The window is
//! stamped before the provider call is made; a failed call still spends it.

use chrono::Utc;

use crate::db::firestore::FirestoreDb;
use crate::error::Result;

/// Minimum gap between fitness provider syncs per user.
pub const FITNESS_SYNC_COOLDOWN_SECS: u64 = 15 * 60;

const FITNESS_SYNC_KEY: &str = "fitness_sync";

/// Seconds until `expires_at_ms`, rounded up so a display of "1s" never
/// lies about an almost-elapsed window. Elapsed windows read as 0.
pub fn remaining_seconds(expires_at_ms: i64, now_ms: i64) -> u64 {
    let remaining_ms = expires_at_ms.saturating_sub(now_ms);
    if remaining_ms <= 0 {
        0
    } else {
        ((remaining_ms + 999) / 1000) as u64
    }
}

#[derive(Clone)]
pub struct CooldownTracker {
    db: FirestoreDb,
}

impl CooldownTracker {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Opens a fresh fitness sync window for the user, replacing any
    /// previous one.
    pub async fn start_fitness_sync(&self, user_id: &str) -> Result<()> {
        let expires_at_ms = Utc::now().timestamp_millis()
            + (FITNESS_SYNC_COOLDOWN_SECS as i64) * 1000;
        self.db
            .set_cooldown(user_id, FITNESS_SYNC_KEY, expires_at_ms)
            .await
    }

    /// Seconds left on the user's fitness sync window, 0 when clear.
    /// An elapsed window is deleted on read.
    pub async fn fitness_sync_remaining(&self, user_id: &str) -> Result<u64> {
        let Some(expires_at_ms) = self.db.get_cooldown(user_id, FITNESS_SYNC_KEY).await? else {
            return Ok(0);
        };

        let remaining = remaining_seconds(expires_at_ms, Utc::now().timestamp_millis());
        if remaining == 0 {
            self.db.clear_cooldown(user_id, FITNESS_SYNC_KEY).await?;
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_rounds_up() {
        assert_eq!(remaining_seconds(1_000, 0), 1);
        assert_eq!(remaining_seconds(1_001, 0), 2);
        assert_eq!(remaining_seconds(999, 0), 1);
        assert_eq!(remaining_seconds(5_000, 0), 5);
    }

    #[test]
    fn test_elapsed_window_reads_zero() {
        assert_eq!(remaining_seconds(1_000, 1_000), 0);
        assert_eq!(remaining_seconds(1_000, 2_000), 0);
    }

    #[test]
    fn test_full_window() {
        let now_ms = 1_756_000_000_000;
        let expiry = now_ms + (FITNESS_SYNC_COOLDOWN_SECS as i64) * 1000;
        assert_eq!(remaining_seconds(expiry, now_ms), 900);
    }
}
