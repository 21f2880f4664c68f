// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider contract and session-change notifications.

use crate::error::AuthError;
use crate::models::{Session, SignUpResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Capacity of provider change channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Why the provider's session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// Session-change notification pushed by the provider.
///
/// Each change carries the full new session, so the newest change is
/// always authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Live subscription to a provider's session changes.
///
/// Dropping it unsubscribes.
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthStateChange>,
}

impl AuthSubscription {
    pub fn new(rx: broadcast::Receiver<AuthStateChange>) -> Self {
        Self { rx }
    }

    /// Wait for the next change. `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<AuthStateChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Later changes supersede the skipped ones.
                    tracing::warn!(skipped, "Auth subscription lagged, skipping to newest change");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// External identity provider.
///
/// Every operation reports failures as an [`AuthError`] value; transport
/// problems are mapped onto the closest variant by the implementation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Session the provider currently holds, if any.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session changes.
    fn subscribe(&self) -> AuthSubscription;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpResult, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Complete a magic-link or redirect sign-in from the landing URL.
    ///
    /// `Ok(None)` when the URL carries no auth parameters.
    async fn session_from_url(&self, url: &str) -> Result<Option<Session>, AuthError>;
}

/// Auth parameters carried in a redirect URL's fragment or query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse parameters from both the query string and the fragment.
    /// Fragment values win.
    pub fn parse(url: &str) -> Self {
        let (before_fragment, fragment) = url.split_once('#').unwrap_or((url, ""));
        let query = before_fragment
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or("");

        let mut params: HashMap<String, String> = HashMap::new();
        for pair in query.split('&').chain(fragment.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.replace('+', " ");
            let value = urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value);
            params.insert(key.to_string(), value);
        }

        Self {
            access_token: params.remove("access_token").filter(|t| !t.is_empty()),
            refresh_token: params.remove("refresh_token").filter(|t| !t.is_empty()),
            expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
            error_description: params
                .remove("error_description")
                .or_else(|| params.remove("error"))
                .filter(|e| !e.is_empty()),
        }
    }

    /// Whether the URL carried anything auth-related at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.error_description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_tokens() {
        let params = CallbackParams::parse(
            "https://app.example.com/auth/callback#access_token=abc&refresh_token=def&expires_in=3600&token_type=bearer",
        );
        assert_eq!(params.access_token.as_deref(), Some("abc"));
        assert_eq!(params.refresh_token.as_deref(), Some("def"));
        assert_eq!(params.expires_in, Some(3600));
        assert!(!params.is_empty());
    }

    #[test]
    fn test_parse_error_description() {
        let params = CallbackParams::parse(
            "https://app.example.com/auth/callback?error=access_denied&error_description=Email+link+is+invalid+or+has+expired",
        );
        assert_eq!(
            params.error_description.as_deref(),
            Some("Email link is invalid or has expired")
        );
        assert_eq!(params.access_token, None);
    }

    #[test]
    fn test_parse_plain_url_is_empty() {
        assert!(CallbackParams::parse("https://app.example.com/auth/callback").is_empty());
        assert!(CallbackParams::parse("https://app.example.com/?foo=bar#section").is_empty());
    }
}
