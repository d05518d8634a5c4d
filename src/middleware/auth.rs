// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication.
//!
//! Every game route runs behind [`require_auth`], which accepts the session
//! JWT either as the `rankquest_token` cookie (browser clients) or as a
//! bearer token (everything else) and stashes an [`AuthUser`] in the request
//! extensions for handlers to pull out.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie set by the login flow.
pub const SESSION_COOKIE: &str = "rankquest_token";

/// Sessions stay valid for 30 days; renewal is a fresh login.
const SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Claims carried by the session JWT.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user ID.
    pub sub: String,
    /// Expiration, Unix seconds.
    pub exp: usize,
    /// Issued at, Unix seconds.
    pub iat: usize,
}

/// Identity of the caller, inserted into request extensions on success.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// The session token, from the cookie jar or the Authorization header.
///
/// The cookie wins when both are present.
fn session_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Reject the request with 401 unless it carries a valid session JWT.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(&jar, &request).ok_or(StatusCode::UNAUTHORIZED)?;

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);
    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;

    // A signed-but-empty subject is still not a user.
    if token_data.claims.sub.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    request.extensions_mut().insert(AuthUser {
        user_id: token_data.claims.sub,
    });

    Ok(next.run(request).await)
}

/// Mint a session JWT for a user.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now as usize,
        exp: (now + SESSION_TTL_SECS) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
