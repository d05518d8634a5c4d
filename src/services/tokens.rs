// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle shared by the provider services.
//!
//! Access tokens live in an in-memory cache and are refreshed through a
//! per-user async lock, so concurrent requests trigger at most one refresh.
//! A refresh race across instances surfaces as `invalid_grant`; the loser
//! adopts whatever tokens the winning instance stored.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::firestore::FirestoreDb;
use crate::error::AppError;
use crate::models::token::ProviderToken;

/// Tokens are treated as expired this many seconds early.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// A usable access token and when it stops being usable.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Access tokens by user id, shared across every clone of a provider service.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// One mutex per user, serializing that user's refresh calls.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// What a provider hands back from a refresh call, normalized.
#[derive(Debug, Clone)]
pub struct RefreshedCredential {
    pub access_token: String,
    /// `None` when the provider kept the old refresh token valid.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Token lookup, caching, and refresh for one provider.
///
/// The provider-specific half of a refresh (endpoint, auth style, response
/// shape) comes in as a closure; everything around it is the same for every
/// provider.
#[derive(Clone)]
pub struct TokenManager {
    provider: &'static str,
    db: FirestoreDb,
    cache: TokenCache,
    locks: RefreshLocks,
}

impl TokenManager {
    pub fn new(
        provider: &'static str,
        db: FirestoreDb,
        cache: TokenCache,
        locks: RefreshLocks,
    ) -> Self {
        Self {
            provider,
            db,
            cache,
            locks,
        }
    }

    /// Produce an access token good for at least the refresh margin.
    ///
    /// `refresh` receives the stored refresh token and only runs when both
    /// the cached and the stored credential are too close to expiry.
    pub async fn valid_access_token<F, Fut>(
        &self,
        user_id: &str,
        refresh: F,
    ) -> Result<String, AppError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshedCredential, AppError>>,
    {
        if let Some(token) = self.fresh_cached(user_id) {
            return Ok(token);
        }

        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // A concurrent request may have finished the refresh while we queued.
        if let Some(token) = self.fresh_cached(user_id) {
            return Ok(token);
        }

        let stored = self
            .db
            .get_provider_token(user_id, self.provider)
            .await?
            .ok_or_else(|| AppError::StaleCredential(self.provider.to_string()))?;

        let expires_at = parse_expiry(&stored.expires_at)?;
        if outlives_margin(expires_at) {
            self.remember(user_id, &stored.access_token, expires_at);
            return Ok(stored.access_token);
        }

        tracing::info!(
            user_id = %user_id,
            provider = self.provider,
            "Access token expired, refreshing"
        );

        let refreshed = match refresh(stored.refresh_token.clone()).await {
            Ok(credential) => credential,
            // invalid_grant on a token we just read means a sibling instance
            // rotated it first; its result is already in Firestore.
            Err(AppError::Provider(ref msg)) if msg.contains("invalid_grant") => {
                tracing::info!(
                    user_id = %user_id,
                    provider = self.provider,
                    "Refresh token already rotated elsewhere, adopting stored tokens"
                );
                return self.adopt_stored(user_id).await;
            }
            Err(e) => return Err(e),
        };

        let updated = ProviderToken {
            access_token: refreshed.access_token,
            refresh_token: refreshed
                .refresh_token
                .unwrap_or_else(|| stored.refresh_token.clone()),
            expires_at: refreshed.expires_at.to_rfc3339(),
            ..stored
        };
        self.db.store_provider_token(&updated).await?;
        self.remember(user_id, &updated.access_token, refreshed.expires_at);

        tracing::info!(
            user_id = %user_id,
            provider = self.provider,
            "Access token refreshed and cached"
        );
        Ok(updated.access_token)
    }

    /// Whether any credential is on file for the user, expired or not.
    pub async fn is_connected(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self
            .db
            .get_provider_token(user_id, self.provider)
            .await?
            .is_some())
    }

    /// Trust whatever credential Firestore currently holds and cache it.
    /// If that one is dead too, the next provider call reports it stale.
    async fn adopt_stored(&self, user_id: &str) -> Result<String, AppError> {
        let stored = self
            .db
            .get_provider_token(user_id, self.provider)
            .await?
            .ok_or_else(|| AppError::StaleCredential(self.provider.to_string()))?;

        let expires_at = parse_expiry(&stored.expires_at)?;
        self.remember(user_id, &stored.access_token, expires_at);
        Ok(stored.access_token)
    }

    fn fresh_cached(&self, user_id: &str) -> Option<String> {
        let cached = self.cache.get(user_id)?;
        outlives_margin(cached.expires_at).then(|| cached.access_token.clone())
    }

    fn remember(&self, user_id: &str, access_token: &str, expires_at: DateTime<Utc>) {
        self.cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            },
        );
    }
}

fn outlives_margin(expires_at: DateTime<Utc>) -> bool {
    Utc::now() + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) < expires_at
}

fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("stored token expiry is not RFC 3339: {}", e))
        })
}
