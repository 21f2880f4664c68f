// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Landing page for magic-link and email-confirmation redirects.

use crate::middleware::RouteGuard;
use crate::services::SessionManager;

/// Where to go after processing a landing URL, and what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub redirect: String,
    pub message: String,
    pub signed_in: bool,
}

/// Complete a sign-in from a landing URL.
///
/// Success redirects home; anything else goes back to the sign-in page
/// with the reason.
pub async fn complete_callback(
    manager: &SessionManager,
    url: &str,
    guard: &RouteGuard,
) -> CallbackOutcome {
    match manager.complete_sign_in_from_url(url).await {
        Ok(Some(session)) => {
            tracing::info!(user_id = %session.user_id(), "Completed sign-in from email link");
            CallbackOutcome {
                redirect: guard.home_path.clone(),
                message: "Signed in successfully".to_string(),
                signed_in: true,
            }
        }
        Ok(None) => CallbackOutcome {
            redirect: guard.sign_in_path.clone(),
            message: "Could not sign in with this link. Please sign in again.".to_string(),
            signed_in: false,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Email link sign-in failed");
            CallbackOutcome {
                redirect: guard.sign_in_path.clone(),
                message: e.to_string(),
                signed_in: false,
            }
        }
    }
}
