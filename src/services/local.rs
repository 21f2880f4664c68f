// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process identity provider.
//!
//! Holds registered users and the current session in memory and pushes
//! changes to subscribers like a hosted provider would. Used for tests,
//! demos and offline development.

use super::identity::{
    AuthEvent, AuthStateChange, AuthSubscription, CallbackParams, IdentityProvider,
    EVENT_CHANNEL_CAPACITY,
};
use crate::error::AuthError;
use crate::models::{Identity, Session, SignUpResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::sync::broadcast;

const SESSION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct LocalUser {
    identity: Identity,
    /// `None` for users created through a magic link
    password: Option<String>,
    confirmed: bool,
}

/// Identity provider living entirely in this process.
pub struct LocalIdentityProvider {
    users: DashMap<String, LocalUser>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    /// Outstanding magic links by email
    magic_links: DashMap<String, String>,
    password_resets: DashMap<String, usize>,
    require_confirmation: AtomicBool,
    offline: AtomicBool,
    next_id: AtomicU64,
    sign_in_calls: AtomicUsize,
    redirect_url: String,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            users: DashMap::new(),
            session: RwLock::new(None),
            events,
            magic_links: DashMap::new(),
            password_resets: DashMap::new(),
            require_confirmation: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            sign_in_calls: AtomicUsize::new(0),
            redirect_url: "http://localhost:5173/auth/callback".to_string(),
        }
    }

    /// Require new sign-ups to confirm their email before signing in.
    pub fn with_email_confirmation(self, required: bool) -> Self {
        self.require_confirmation.store(required, Ordering::SeqCst);
        self
    }

    /// Register a confirmed user.
    pub fn register(&self, email: &str, password: &str) -> Identity {
        self.insert_user(email, Some(password), true)
    }

    /// Mark a pending sign-up as confirmed.
    pub fn confirm(&self, email: &str) {
        if let Some(mut user) = self.users.get_mut(&normalize(email)) {
            user.confirmed = true;
        }
    }

    /// Mint a session for an identity without signing it in.
    pub fn issue_session(&self, identity: &Identity) -> Session {
        let serial = self.next_id.fetch_add(1, Ordering::SeqCst);
        Session {
            access_token: format!("local-access-{}-{}", identity.id, serial),
            refresh_token: Some(format!("local-refresh-{}-{}", identity.id, serial)),
            expires_at: Some(Utc::now() + Duration::seconds(SESSION_LIFETIME_SECS)),
            user: identity.clone(),
        }
    }

    /// Replace the held session silently, as if restored from storage at startup.
    pub fn restore_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    /// Replace the held session and notify subscribers.
    ///
    /// Simulates provider-side transitions such as token refresh or expiry.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        self.restore_session(session.clone());
        self.notify(event, session);
    }

    /// Make every operation fail as if the provider were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of password sign-in requests that reached the provider.
    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Landing URL of the most recent magic link sent to `email`.
    pub fn magic_link_for(&self, email: &str) -> Option<String> {
        self.magic_links.get(&normalize(email)).map(|link| link.clone())
    }

    /// Number of password reset emails sent to `email`.
    pub fn password_resets_for(&self, email: &str) -> usize {
        self.password_resets
            .get(&normalize(email))
            .map(|n| *n)
            .unwrap_or(0)
    }

    fn insert_user(&self, email: &str, password: Option<&str>, confirmed: bool) -> Identity {
        let serial = self.next_id.fetch_add(1, Ordering::SeqCst);
        let identity = Identity {
            id: format!("local-user-{}", serial),
            email: normalize(email),
        };
        self.users.insert(
            normalize(email),
            LocalUser {
                identity: identity.clone(),
                password: password.map(str::to_string),
                confirmed,
            },
        );
        identity
    }

    fn sign_in_identity(&self, identity: &Identity) -> Session {
        let session = self.issue_session(identity);
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        session
    }

    fn notify(&self, event: AuthEvent, session: Option<Session>) {
        // No subscribers is fine.
        let _ = self.events.send(AuthStateChange::new(event, session));
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable(
                "identity provider not reachable (offline mode)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        self.check_online()?;
        Ok(self
            .session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let user = self
            .users
            .get(&normalize(email))
            .map(|u| u.clone())
            .filter(|u| u.password.as_deref() == Some(password))
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        Ok(self.sign_in_identity(&user.identity))
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpResult, AuthError> {
        self.check_online()?;

        if self.users.contains_key(&normalize(email)) {
            return Err(AuthError::Provider("User already registered".to_string()));
        }

        let confirmed = !self.require_confirmation.load(Ordering::SeqCst);
        let identity = self.insert_user(email, Some(password), confirmed);

        let session = confirmed.then(|| self.sign_in_identity(&identity));
        Ok(SignUpResult {
            session,
            user_created: true,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.check_online()?;
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        self.check_online()?;

        let key = normalize(email);
        if !self.users.contains_key(&key) {
            self.insert_user(email, None, true);
        }

        let serial = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = format!("local-link-{}", serial);
        let link = format!(
            "{}#access_token={}&refresh_token={}-r&expires_in={}&token_type=bearer&type=magiclink",
            self.redirect_url, token, token, SESSION_LIFETIME_SECS
        );
        self.magic_links.insert(key, link);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.check_online()?;
        *self.password_resets.entry(normalize(email)).or_insert(0) += 1;
        Ok(())
    }

    async fn session_from_url(&self, url: &str) -> Result<Option<Session>, AuthError> {
        self.check_online()?;

        let params = CallbackParams::parse(url);
        if let Some(description) = params.error_description {
            return Err(AuthError::Provider(description));
        }
        let Some(token) = params.access_token else {
            return Ok(None);
        };

        let email = self
            .magic_links
            .iter()
            .find(|entry| {
                CallbackParams::parse(entry.value()).access_token.as_deref() == Some(token.as_str())
            })
            .map(|entry| entry.key().clone())
            .ok_or_else(|| {
                AuthError::Provider("Email link is invalid or has expired".to_string())
            })?;
        self.magic_links.remove(&email);

        let identity = self
            .users
            .get(&email)
            .map(|u| u.identity.clone())
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(Some(self.sign_in_identity(&identity)))
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
