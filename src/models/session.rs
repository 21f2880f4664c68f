// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider-issued session and the identity it carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable reference to a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider user ID (also the profile record key)
    pub id: String,
    /// Email address used to sign in
    #[serde(default)]
    pub email: String,
}

/// Token bundle issued by the identity provider.
///
/// Only the embedded identity is interpreted here; the tokens are passed
/// back to the provider as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Identity,
}

impl Session {
    pub fn identity(&self) -> &Identity {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Whether the access token has passed its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Result of a password sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResult {
    /// Present when the provider signed the new user in immediately.
    pub session: Option<Session>,
    /// Whether a new account was created.
    pub user_created: bool,
}

impl SignUpResult {
    /// Account exists but must be confirmed by email before signing in.
    pub fn needs_confirmation(&self) -> bool {
        self.user_created && self.session.is_none()
    }
}
