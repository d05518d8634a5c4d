// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored OAuth credentials for external providers.

use serde::{Deserialize, Serialize};

pub const PROVIDER_STRAVA: &str = "strava";
pub const PROVIDER_SPOTIFY: &str = "spotify";

/// One provider credential, written by the client's OAuth flow and kept
/// fresh by the sync services. Stored in `provider_tokens`, keyed by
/// `{user_id}_{provider}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderToken {
    pub user_id: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: String,
    /// RFC 3339.
    pub expires_at: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub connected_at: String,
}

impl ProviderToken {
    pub fn doc_id(user_id: &str, provider: &str) -> String {
        format!("{}_{}", urlencoding::encode(user_id), provider)
    }
}
