// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use authgate::error::ProfileError;
use authgate::models::{Identity, Profile, ProfileUpsert};
use authgate::services::{AuthState, LocalIdentityProvider, SessionManager};
use authgate::store::{MemoryProfileStore, ProfileStore};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Profile store whose reads for selected IDs block until released.
#[allow(dead_code)]
#[derive(Default)]
pub struct GatedProfileStore {
    pub inner: MemoryProfileStore,
    gates: DashMap<String, Arc<Semaphore>>,
    completed: AtomicUsize,
}

#[allow(dead_code)]
impl GatedProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block reads of `id` until [`release`](Self::release) is called.
    pub fn hold(&self, id: &str) {
        self.gates.insert(id.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, id: &str) {
        if let Some((_, gate)) = self.gates.remove(id) {
            gate.add_permits(1024);
        }
    }

    /// Reads that have returned.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for GatedProfileStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileError> {
        let gate = self.gates.get(id).map(|g| g.value().clone());
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        let result = self.inner.get_by_id(id).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn upsert(&self, record: &ProfileUpsert) -> Result<(), ProfileError> {
        self.inner.upsert(record).await
    }
}

/// Stored profile with a first name and role.
#[allow(dead_code)]
pub fn profile(id: &str, first_name: &str, role: Option<&str>) -> Profile {
    let mut profile = Profile::new(id);
    profile.first_name = Some(first_name.to_string());
    profile.role = role.map(str::to_string);
    profile
}

#[allow(dead_code)]
pub fn identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: format!("{}@example.com", id),
    }
}

/// Provider, profile store and a started manager.
#[allow(dead_code)]
pub struct Harness {
    pub provider: Arc<LocalIdentityProvider>,
    pub profiles: Arc<GatedProfileStore>,
    pub manager: Arc<SessionManager>,
}

#[allow(dead_code)]
impl Harness {
    pub fn start() -> Self {
        Self::start_with(LocalIdentityProvider::new(), GatedProfileStore::new())
    }

    pub fn start_with(provider: LocalIdentityProvider, profiles: GatedProfileStore) -> Self {
        let provider = Arc::new(provider);
        let profiles = Arc::new(profiles);
        let manager = Arc::new(SessionManager::start(provider.clone(), profiles.clone()));
        Self {
            provider,
            profiles,
            manager,
        }
    }

    /// Register a user together with a stored profile.
    pub fn add_user(&self, email: &str, password: &str, first_name: &str) -> Identity {
        let identity = self.provider.register(email, password);
        self.profiles
            .inner
            .insert(profile(&identity.id, first_name, None));
        identity
    }
}

/// Wait until the manager's state satisfies `pred`.
#[allow(dead_code)]
pub async fn wait_for_state(
    manager: &SessionManager,
    pred: impl FnMut(&AuthState) -> bool,
) -> AuthState {
    let mut rx = manager.watch();
    let state = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for auth state")
        .expect("session manager state channel closed");
    state.clone()
}

/// Poll until `cond` holds.
#[allow(dead_code)]
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

/// Profile / identity consistency that must hold in every observed state.
#[allow(dead_code)]
pub fn assert_consistent(state: &AuthState) {
    match (state.identity(), &state.profile) {
        (Some(identity), Some(profile)) => assert_eq!(profile.id, identity.id),
        (None, profile) => assert!(profile.is_none(), "profile without identity"),
        (Some(_), None) => {}
    }
}
