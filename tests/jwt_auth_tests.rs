// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session token tests.
//!
//! `create_jwt` mints what `require_auth` later decodes; these tests pin the
//! claim format from the decoding side so a drift in either half shows up
//! here before it shows up as logged-out users.

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use rankquest::middleware::auth::create_jwt;
use serde::{Deserialize, Serialize};

const SIGNING_KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

/// Deliberately a local copy of the middleware's claim set: decoding with a
/// second definition is the compatibility check.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    iat: usize,
}

fn decode_with(key: &[u8], token: &str) -> jsonwebtoken::errors::Result<TokenData<Claims>> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(key),
        &Validation::new(Algorithm::HS256),
    )
}

#[test]
fn test_jwt_roundtrip() {
    let user_id = "user-12345678";
    let token = create_jwt(user_id, SIGNING_KEY).expect("Failed to create JWT");

    let claims = decode_with(SIGNING_KEY, &token)
        .expect("Failed to decode JWT - check Claims struct compatibility")
        .claims;

    assert_eq!(claims.sub, user_id);
    assert!(claims.iat > 0);
    assert!(claims.exp > claims.iat);
}

#[test]
fn test_jwt_subject_is_opaque_string() {
    // User IDs are opaque strings, not numbers; punctuation must survive.
    let user_id = "auth0|64b7f0e2c9";
    let token = create_jwt(user_id, SIGNING_KEY).expect("Failed to create JWT");

    let claims = decode_with(SIGNING_KEY, &token).unwrap().claims;
    assert_eq!(claims.sub, user_id);
}

#[test]
fn test_jwt_expiration_is_future() {
    let token = create_jwt("user-12345", SIGNING_KEY).expect("Failed to create JWT");

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false; // checked manually below
    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(SIGNING_KEY),
        &validation,
    )
    .unwrap();

    // Sessions run 30 days; allow a day of slack around "now".
    let now = Utc::now().timestamp() as usize;
    assert!(
        token_data.claims.exp > now + 86400 * 29,
        "Token expiration should be ~30 days in the future"
    );
}

#[test]
fn test_jwt_rejects_tampered_signature() {
    let token = create_jwt("user-12345", SIGNING_KEY).expect("Failed to create JWT");

    let wrong_key = b"a_completely_different_key_here!";
    assert!(decode_with(wrong_key, &token).is_err());
}
