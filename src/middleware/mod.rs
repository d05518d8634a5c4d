// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request-path middleware: session auth and response hardening.

pub mod auth;
pub mod security;

pub use auth::require_auth;
