// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: the authoritative session / profile state of the client.
//!
//! On start the manager subscribes to the identity provider, then asks it
//! for any existing session and loads that identity's profile before marking
//! itself ready. Every pushed change replaces the session and triggers a
//! fresh profile fetch.
//!
//! Profile fetches run concurrently with later changes. Each fetch is tagged
//! with the identity it was issued for and a sequence number, and its result
//! is dropped if the identity has changed or a newer fetch already landed.

use super::identity::{AuthStateChange, AuthSubscription, IdentityProvider};
use crate::error::{AuthError, ProfileError};
use crate::models::{Identity, Profile, ProfileChanges, ProfileUpsert, Session, SignUpResult};
use crate::store::ProfileStore;
use crate::time_utils::{Clock, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// Snapshot of the client's authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// `false` until the first reconciliation with the provider completes
    pub ready: bool,
    pub session: Option<Session>,
    /// Cached profile of the current identity
    pub profile: Option<Profile>,
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(Session::identity)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<AuthState>,
    /// Pushed changes applied so far
    changes_applied: AtomicU64,
    /// Last profile fetch issued / applied
    fetch_seq: AtomicU64,
    applied_seq: AtomicU64,
    fetches: Mutex<FetchTasks>,
}

/// Profile fetches spawned for pushed changes.
#[derive(Default)]
struct FetchTasks {
    running: JoinSet<()>,
    /// Set once the manager is dropped; no new fetches start after that
    closed: bool,
}

/// Owns session and profile state for the lifetime of the client.
///
/// Dropping the manager stops its background tasks and releases the
/// provider subscription.
pub struct SessionManager {
    inner: Arc<Inner>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionManager {
    /// Start a manager; must be called from within a Tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self::with_clock(provider, profiles, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let inner = Arc::new(Inner {
            provider,
            profiles,
            clock,
            state,
            changes_applied: AtomicU64::new(0),
            fetch_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
            fetches: Mutex::new(FetchTasks::default()),
        });

        // Subscribe before querying so no change can slip in between.
        let subscription = inner.provider.subscribe();
        let listener = tokio::spawn(inner.clone().listen(subscription));
        let init = tokio::spawn(inner.clone().initialize());

        Self {
            inner,
            tasks: vec![init, listener],
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Wait until the initial reconciliation has finished.
    pub async fn ready(&self) -> AuthState {
        let mut rx = self.watch();
        let state = match rx.wait_for(|s| s.ready).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.borrow().ready
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.borrow().session.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.state.borrow().profile.clone()
    }

    /// Password sign-in. State changes arrive through the provider's push.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.inner.provider.sign_in_with_password(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResult, AuthError> {
        self.inner.provider.sign_up_with_password(email, password).await
    }

    /// Sign out at the provider.
    ///
    /// Local state is left alone until the provider pushes the sign-out.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.provider.sign_out().await
    }

    pub async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        self.inner.provider.send_magic_link(email).await
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.inner.provider.send_password_reset(email).await
    }

    /// Complete a magic-link or redirect sign-in from its landing URL.
    pub async fn complete_sign_in_from_url(&self, url: &str) -> Result<Option<Session>, AuthError> {
        self.inner.provider.session_from_url(url).await
    }

    /// Re-fetch the current identity's profile. No-op when signed out.
    pub async fn refresh_profile(&self) {
        let Some(id) = self.inner.state.borrow().user_id().map(str::to_string) else {
            return;
        };
        self.inner.fetch_and_apply(&id, false).await;
    }

    /// Write profile changes for the current identity.
    ///
    /// The cached profile is not refreshed; call [`refresh_profile`] to
    /// observe the write.
    ///
    /// [`refresh_profile`]: SessionManager::refresh_profile
    pub async fn update_profile(&self, changes: ProfileChanges) -> Result<(), ProfileError> {
        let id = self
            .inner
            .state
            .borrow()
            .user_id()
            .map(str::to_string)
            .ok_or(ProfileError::NotAuthenticated)?;

        let record = ProfileUpsert {
            id,
            updated_at: self.inner.clock.now(),
            changes,
        };
        self.inner.profiles.upsert(&record).await?;

        tracing::info!(user_id = %record.id, "Profile updated");
        Ok(())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }

        let mut fetches = self.inner.fetches.lock().unwrap_or_else(|e| e.into_inner());
        fetches.closed = true;
        fetches.running.abort_all();
    }
}

impl Inner {
    async fn initialize(self: Arc<Self>) {
        let session = match self.provider.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to query existing session, starting signed out");
                None
            }
        };

        // A change pushed while we waited is newer than this answer.
        self.state.send_if_modified(|s| {
            if self.changes_applied.load(Ordering::SeqCst) > 0 {
                return false;
            }
            replace_session(s, session)
        });

        let current = self.state.borrow().user_id().map(str::to_string);
        match current {
            Some(id) => self.fetch_and_apply(&id, true).await,
            None => {
                self.state.send_if_modified(|s| !std::mem::replace(&mut s.ready, true));
            }
        }

        let state = self.state.borrow();
        tracing::info!(
            user_id = state.user_id().unwrap_or("<none>"),
            has_profile = state.profile.is_some(),
            "Session manager ready"
        );
    }

    async fn listen(self: Arc<Self>, mut subscription: AuthSubscription) {
        while let Some(change) = subscription.next().await {
            self.apply_change(change);
        }
        tracing::debug!("Identity provider closed its change stream");
    }

    fn apply_change(self: &Arc<Self>, change: AuthStateChange) {
        tracing::info!(
            event = ?change.event,
            user_id = change.session.as_ref().map(Session::user_id).unwrap_or("<none>"),
            "Applying auth state change"
        );

        self.state.send_if_modified(|s| {
            self.changes_applied.fetch_add(1, Ordering::SeqCst);
            replace_session(s, change.session.clone())
        });

        let Some(session) = change.session else {
            return;
        };
        let mut fetches = self.fetches.lock().unwrap_or_else(|e| e.into_inner());
        if fetches.closed {
            return;
        }
        // Reap finished fetches so the set does not grow without bound.
        while fetches.running.try_join_next().is_some() {}

        let inner = self.clone();
        fetches.running.spawn(async move {
            inner.fetch_and_apply(session.user_id(), false).await;
        });
    }

    /// Fetch one identity's profile and apply it if still current.
    async fn fetch_and_apply(&self, id: &str, mark_ready: bool) {
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let profile = match self.profiles.get_by_id(id).await {
            Ok(profile) => profile.filter(|p| p.id == id),
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Profile fetch failed, continuing without profile");
                None
            }
        };

        self.state.send_if_modified(|s| {
            let mut changed = false;
            if mark_ready && !s.ready {
                s.ready = true;
                changed = true;
            }

            if s.user_id() != Some(id) || seq < self.applied_seq.load(Ordering::SeqCst) {
                tracing::debug!(user_id = %id, seq, "Discarding stale profile fetch");
                return changed;
            }
            self.applied_seq.store(seq, Ordering::SeqCst);

            if s.profile != profile {
                s.profile = profile;
                changed = true;
            }
            changed
        });
    }
}

/// Install a new session, dropping the cached profile if the identity changed.
fn replace_session(state: &mut AuthState, session: Option<Session>) -> bool {
    let identity_changed = state.user_id() != session.as_ref().map(Session::user_id);
    if identity_changed {
        state.profile = None;
    }
    if state.session == session && !identity_changed {
        return false;
    }
    state.session = session;
    true
}
