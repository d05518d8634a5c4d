// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify API client for pulling listening history into the music sync.
//!
//! Two provider quirks live here: refresh responses carry a relative
//! `expires_in` rather than an absolute expiry, and the rotated refresh
//! token is optional (absent means the stored one is still good). The rest
//! of the token lifecycle sits in [`TokenManager`].

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::db::firestore::FirestoreDb;
use crate::error::AppError;
use crate::models::token::PROVIDER_SPOTIFY;
use crate::services::normalizer::RawPlay;
use crate::services::tokens::{RefreshLocks, RefreshedCredential, TokenCache, TokenManager};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Spotify's hard maximum for the recently-played endpoint.
const RECENTLY_PLAYED_LIMIT: u32 = 50;

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Plays started after `after_ms` (Unix milliseconds), most recent
    /// first. Spotify caps this at 50 items with no further paging.
    pub async fn recently_played(
        &self,
        access_token: &str,
        after_ms: i64,
    ) -> Result<RecentlyPlayedResponse, AppError> {
        let url = format!("{}/me/player/recently-played", self.base_url);

        let response = self
            .http
            .get(&url)
            .timeout(HTTP_TIMEOUT)
            .bearer_auth(access_token)
            .query(&[
                ("after", after_ms.to_string()),
                ("limit", RECENTLY_PLAYED_LIMIT.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("spotify: {}", e)))?;

        self.decode_response(response).await
    }

    /// Refresh an expired access token. Spotify authenticates the app with
    /// a Basic header rather than form credentials.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<SpotifyRefreshResponse, AppError> {
        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(&self.token_url)
            .timeout(HTTP_TIMEOUT)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("spotify token refresh: {}", e)))?;

        self.decode_response(response).await
    }

    async fn decode_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::StaleCredential(PROVIDER_SPOTIFY.to_string()));
            }
            if status.as_u16() == 429 {
                tracing::warn!("Rate limited by Spotify (429)");
            }
            return Err(AppError::Provider(format!(
                "spotify HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("spotify JSON parse error: {}", e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyRefreshResponse {
    pub access_token: String,
    /// Seconds until expiry.
    pub expires_in: i64,
    /// Spotify omits this when the old refresh token stays valid.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryItem {
    pub track: PlayedTrack,
    /// RFC 3339 timestamp of when the play started.
    pub played_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayedTrack {
    pub duration_ms: u64,
}

/// Spotify calls on behalf of a user, with token upkeep delegated to
/// [`TokenManager`].
#[derive(Clone)]
pub struct SpotifyService {
    client: SpotifyClient,
    tokens: TokenManager,
}

impl SpotifyService {
    pub fn new(
        client_id: String,
        client_secret: String,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client: SpotifyClient::new(client_id, client_secret),
            tokens: TokenManager::new(PROVIDER_SPOTIFY, db, token_cache, refresh_locks),
        }
    }

    /// A non-expired access token for the user, refreshing if needed.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let client = self.client.clone();
        self.tokens
            .valid_access_token(user_id, |refresh_token| async move {
                let refreshed = client.refresh_token(&refresh_token).await?;
                Ok(RefreshedCredential {
                    access_token: refreshed.access_token,
                    refresh_token: refreshed.refresh_token,
                    expires_at: Utc::now() + ChronoDuration::seconds(refreshed.expires_in),
                })
            })
            .await
    }

    /// Whether the user has a stored Spotify credential.
    pub async fn is_connected(&self, user_id: &str) -> Result<bool, AppError> {
        self.tokens.is_connected(user_id).await
    }

    /// Plays started strictly after `after_ms`, as normalizer input.
    pub async fn fetch_plays_since(
        &self,
        user_id: &str,
        after_ms: i64,
    ) -> Result<Vec<RawPlay>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let response = self.client.recently_played(&access_token, after_ms).await?;
        response.items.into_iter().map(item_to_raw).collect()
    }
}

fn item_to_raw(item: PlayHistoryItem) -> Result<RawPlay, AppError> {
    let played_at_ms = DateTime::parse_from_rfc3339(&item.played_at)
        .map_err(|e| AppError::Provider(format!("spotify play has malformed played_at: {}", e)))?
        .timestamp_millis();

    Ok(RawPlay {
        duration_ms: item.track.duration_ms,
        played_at_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_conversion_keeps_millisecond_precision() {
        let item = PlayHistoryItem {
            track: PlayedTrack { duration_ms: 214_500 },
            played_at: "2026-03-07T06:30:00.250Z".to_string(),
        };
        let raw = item_to_raw(item).unwrap();
        assert_eq!(raw.duration_ms, 214_500);
        assert_eq!(raw.played_at_ms, 1_772_865_000_250);
    }
}
