// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

mod common;

use authgate::middleware::{evaluate, Access, Navigation, RouteGuard};
use authgate::models::{Session, ADMIN_ROLE};
use authgate::services::AuthState;
use common::{identity, profile};

fn session(id: &str) -> Session {
    Session {
        access_token: format!("token-{}", id),
        refresh_token: None,
        expires_at: None,
        user: identity(id),
    }
}

fn state(ready: bool, user: Option<&str>, role: Option<Option<&str>>) -> AuthState {
    AuthState {
        ready,
        session: user.map(session),
        profile: user.zip(role).map(|(id, role)| profile(id, "Test", role)),
    }
}

#[test]
fn test_not_ready_is_pending() {
    for s in [
        state(false, None, None),
        state(false, Some("u1"), Some(Some(ADMIN_ROLE))),
    ] {
        assert_eq!(evaluate(&s, &[]), Access::Pending);
        assert_eq!(evaluate(&s, &[ADMIN_ROLE]), Access::Pending);
    }
}

#[test]
fn test_signed_out_is_unauthenticated() {
    let s = state(true, None, None);
    assert_eq!(evaluate(&s, &[]), Access::Unauthenticated);
    assert_eq!(evaluate(&s, &[ADMIN_ROLE]), Access::Unauthenticated);
}

#[test]
fn test_user_role_forbidden_for_admin_view() {
    let s = state(true, Some("u1"), Some(Some("USER")));
    assert_eq!(evaluate(&s, &[ADMIN_ROLE]), Access::Forbidden);
}

#[test]
fn test_admin_role_allowed() {
    let s = state(true, Some("u1"), Some(Some(ADMIN_ROLE)));
    assert_eq!(evaluate(&s, &[ADMIN_ROLE]), Access::Allowed);
}

#[test]
fn test_missing_profile_with_empty_allow_list_allowed() {
    let s = state(true, Some("u1"), None);
    assert_eq!(evaluate(&s, &[]), Access::Allowed);
}

#[test]
fn test_missing_role_defaults_to_user() {
    let no_role = state(true, Some("u1"), Some(None));
    assert_eq!(evaluate(&no_role, &["USER"]), Access::Allowed);
    assert_eq!(evaluate(&no_role, &[ADMIN_ROLE]), Access::Forbidden);

    let no_profile = state(true, Some("u1"), None);
    assert_eq!(evaluate(&no_profile, &["USER", ADMIN_ROLE]), Access::Allowed);
}

#[test]
fn test_route_guard_navigation() {
    let guard = RouteGuard::new("/sign-in", "/dashboard");

    assert_eq!(
        guard.resolve(&state(false, None, None), &[]),
        Navigation::Loading
    );
    assert_eq!(
        guard.resolve(&state(true, None, None), &[]),
        Navigation::Redirect("/sign-in".to_string())
    );
    assert_eq!(
        guard.resolve(&state(true, Some("u1"), Some(Some("USER"))), &[ADMIN_ROLE]),
        Navigation::Redirect("/dashboard".to_string())
    );
    assert_eq!(
        guard.resolve(&state(true, Some("u1"), Some(Some(ADMIN_ROLE))), &[ADMIN_ROLE]),
        Navigation::Render
    );
}
