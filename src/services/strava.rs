// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for pulling activities into the fitness sync.
//!
//! The client is a thin reqwest wrapper; the service above it pages
//! activities past a watermark and leans on [`TokenManager`] for credential
//! upkeep.

use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;

use crate::db::firestore::FirestoreDb;
use crate::error::AppError;
use crate::models::token::PROVIDER_STRAVA;
use crate::services::normalizer::RawActivity;
use crate::services::tokens::{RefreshLocks, RefreshedCredential, TokenCache, TokenManager};

/// Per-request deadline for Strava calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const ACTIVITIES_PER_PAGE: u32 = 100;
/// Hard stop on paging within one sync; the cursor picks up the rest next time.
const MAX_SYNC_PAGES: u32 = 10;

/// Thin wrapper over the Strava v3 endpoints the sync uses.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Credentials here are the OAuth application's, not a user's.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// List activities started after `after` (Unix seconds), paginated.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .timeout(HTTP_TIMEOUT)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("strava: {}", e)))?;

        self.decode_response(response).await
    }

    /// Trade the refresh token for a new access token; Strava rotates both.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .timeout(HTTP_TIMEOUT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("strava token refresh: {}", e)))?;

        self.decode_response(response).await
    }

    /// Check response status, parse the JSON body on success.
    ///
    /// 401 means the token no longer works: that is the user's problem to
    /// fix by reconnecting, not a transient provider fault.
    async fn decode_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::StaleCredential(PROVIDER_STRAVA.to_string()));
            }
            if status.as_u16() == 429 {
                tracing::warn!("Rate limited by Strava (429)");
            }
            return Err(AppError::Provider(format!(
                "strava HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("strava JSON parse error: {}", e)))
    }
}

/// Rotated tokens from Strava's OAuth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Summary activity from the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: String,
    pub distance: f64,
    #[serde(default)]
    pub manual: bool,
}

/// Strava calls on behalf of a user, with token upkeep delegated to
/// [`TokenManager`].
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    tokens: TokenManager,
}

impl StravaService {
    /// `token_cache` and `refresh_locks` are shared by every clone of this
    /// service within one process.
    pub fn new(
        client_id: String,
        client_secret: String,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client: StravaClient::new(client_id, client_secret),
            tokens: TokenManager::new(PROVIDER_STRAVA, db, token_cache, refresh_locks),
        }
    }

    /// A non-expired access token for the user, refreshing if needed.
    ///
    /// Strava reports an absolute `expires_at` and always rotates the
    /// refresh token.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let client = self.client.clone();
        self.tokens
            .valid_access_token(user_id, |refresh_token| async move {
                let refreshed = client.refresh_token(&refresh_token).await?;
                let expires_at =
                    DateTime::from_timestamp(refreshed.expires_at, 0).ok_or_else(|| {
                        AppError::Provider("strava returned invalid expiry".to_string())
                    })?;
                Ok(RefreshedCredential {
                    access_token: refreshed.access_token,
                    refresh_token: Some(refreshed.refresh_token),
                    expires_at,
                })
            })
            .await
    }

    /// Whether the user has a Strava credential on file at all.
    pub async fn is_connected(&self, user_id: &str) -> Result<bool, AppError> {
        self.tokens.is_connected(user_id).await
    }

    /// Fetch every activity started strictly after `after` (Unix seconds),
    /// paging until Strava runs dry or the page cap is hit.
    pub async fn fetch_activities_since(
        &self,
        user_id: &str,
        after: i64,
    ) -> Result<Vec<RawActivity>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;

        let mut raw = Vec::new();
        for page in 1..=MAX_SYNC_PAGES {
            let batch = self
                .client
                .list_activities(&access_token, after, page, ACTIVITIES_PER_PAGE)
                .await?;
            let batch_len = batch.len();

            for summary in batch {
                raw.push(summary_to_raw(summary)?);
            }
            if batch_len < ACTIVITIES_PER_PAGE as usize {
                break;
            }
        }

        Ok(raw)
    }
}

fn summary_to_raw(summary: StravaActivitySummary) -> Result<RawActivity, AppError> {
    let started_at = DateTime::parse_from_rfc3339(&summary.start_date)
        .map_err(|e| {
            AppError::Provider(format!(
                "strava activity {} has malformed start_date: {}",
                summary.id, e
            ))
        })?
        .timestamp();

    Ok(RawActivity {
        id: summary.id,
        kind: summary.sport_type,
        distance_meters: summary.distance,
        started_at,
        manual: summary.manual,
    })
}
