// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access guard for protected views.
//!
//! Stateless: re-evaluated from the current [`AuthState`] on every
//! navigation.

use crate::models::DEFAULT_ROLE;
use crate::services::AuthState;

/// Access decision for a protected view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Session state not known yet
    Pending,
    Unauthenticated,
    /// Signed in without an allowed role
    Forbidden,
    Allowed,
}

/// Decide whether a protected view may render.
///
/// An empty `allowed_roles` admits any signed-in identity. A missing
/// profile or role counts as `USER`.
pub fn evaluate(state: &AuthState, allowed_roles: &[&str]) -> Access {
    if !state.ready {
        return Access::Pending;
    }
    if !state.is_authenticated() {
        return Access::Unauthenticated;
    }
    if allowed_roles.is_empty() {
        return Access::Allowed;
    }

    let role = state
        .profile
        .as_ref()
        .map(|p| p.role())
        .unwrap_or(DEFAULT_ROLE);
    if allowed_roles.contains(&role) {
        Access::Allowed
    } else {
        Access::Forbidden
    }
}

/// What the router should do for a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Show a neutral loading indicator
    Loading,
    Redirect(String),
    Render,
}

/// Maps access decisions onto the application's routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    pub sign_in_path: String,
    pub home_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            sign_in_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}

impl RouteGuard {
    pub fn new(sign_in_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
            home_path: home_path.into(),
        }
    }

    pub fn resolve(&self, state: &AuthState, allowed_roles: &[&str]) -> Navigation {
        let access = evaluate(state, allowed_roles);
        tracing::debug!(
            access = ?access,
            user_id = state.user_id().unwrap_or("<none>"),
            "Evaluated route access"
        );

        match access {
            Access::Pending => Navigation::Loading,
            Access::Unauthenticated => Navigation::Redirect(self.sign_in_path.clone()),
            Access::Forbidden => Navigation::Redirect(self.home_path.clone()),
            Access::Allowed => Navigation::Render,
        }
    }
}
