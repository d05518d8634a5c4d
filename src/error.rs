// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error taxonomy and its HTTP mapping.
//!
//! Handlers and services return [`AppError`]; the `IntoResponse` impl is the
//! single place where a failure kind picks its status code and decides how
//! much the client gets to see. Domain rejections carry their message,
//! infrastructure failures are logged and answered opaquely.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed input: unparseable cursor, out-of-range limit.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Well-formed but rejected by a domain rule (study cap, cooldown,
    /// gold balance, level gate, expired assignment).
    #[error("Validation rejected: {0}")]
    Validation(String),

    /// Stored provider credential is missing or no longer accepted; the
    /// user has to re-authorize. Carries the provider name.
    #[error("Stale credential for provider: {0}")]
    StaleCredential(String),

    /// Upstream provider could not be reached or answered with garbage.
    #[error("Provider request failed: {0}")]
    Provider(String),

    /// A transaction lost a write race and was not worth retrying further.
    #[error("Concurrent update: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Status code and machine-readable error code, fixed per variant.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_rejected"),
            AppError::StaleCredential(_) => (StatusCode::FORBIDDEN, "stale_credential"),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_unreachable"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "concurrent_update"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// The detail string the client is allowed to see.
    ///
    /// Provider/database/internal messages stay out of responses; they may
    /// name hosts, collections, or upstream payloads.
    fn client_details(&self) -> Option<String> {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Validation(msg)
            | AppError::StaleCredential(msg)
            | AppError::Conflict(msg) => Some(msg.clone()),
            AppError::Provider(_) | AppError::Database(_) | AppError::Internal(_) => None,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            AppError::Provider(msg) => tracing::warn!(error = %msg, "provider failure"),
            AppError::Database(msg) => tracing::error!(error = %msg, "database failure"),
            AppError::Internal(err) => tracing::error!(error = %err, "unhandled failure"),
            _ => {}
        }

        let body = ErrorResponse {
            error: code.to_string(),
            details: self.client_details(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
