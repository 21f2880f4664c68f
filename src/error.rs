// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for authentication, profile and sign-in throttling.
//!
//! Every error's `Display` output is the single message shown to the user.

use chrono::Duration;

/// Errors reported by the identity provider.
///
/// Returned as values from every provider-facing operation and never
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address has not been confirmed")]
    EmailNotConfirmed,

    #[error("Too many requests, try again later")]
    RateLimited,

    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Provider(String),
}

/// Errors from profile reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid profile: {0}")]
    Invalid(String),

    #[error("Profile store error: {0}")]
    Store(String),
}

/// Local refusal to submit credentials while the sign-in throttle is active.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Too many failed sign-in attempts, try again in {}", format_remaining(.remaining))]
pub struct LockedOut {
    /// Time left until sign-in is allowed again.
    pub remaining: Duration,
}

/// Errors surfaced by the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    LockedOut(#[from] LockedOut),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{error}")]
    Rejected { error: AuthError },

    #[error("{error}. Too many failed attempts, try again in {}", format_remaining(.remaining))]
    RejectedAndLocked { error: AuthError, remaining: Duration },
}

impl LoginError {
    /// The provider error behind this failure, if the provider was contacted.
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            LoginError::Rejected { error } | LoginError::RejectedAndLocked { error, .. } => {
                Some(error)
            }
            LoginError::LockedOut(_) | LoginError::InvalidInput(_) => None,
        }
    }
}

impl From<AuthError> for LoginError {
    fn from(error: AuthError) -> Self {
        LoginError::Rejected { error }
    }
}

/// Format a remaining lockout as `4m 30s`, rounding partial seconds up.
pub fn format_remaining(remaining: &Duration) -> String {
    let millis = remaining.num_milliseconds().max(0);
    let secs = (millis + 999) / 1000;
    match (secs / 60, secs % 60) {
        (0, s) => format!("{}s", s),
        (m, 0) => format!("{}m", m),
        (m, s) => format!("{}m {}s", m, s),
    }
}
