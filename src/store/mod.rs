// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: persisted key-value state and the profile record store.

pub mod attempts;
pub mod file;
pub mod memory;

pub use attempts::{AttemptState, AttemptStore};
pub use file::FileKvStore;
pub use memory::{MemoryKvStore, MemoryProfileStore};

use crate::error::ProfileError;
use crate::models::{Profile, ProfileUpsert};
use async_trait::async_trait;

/// Persisted key names as constants.
pub mod keys {
    /// Failed sign-in counter
    pub const LOGIN_ATTEMPTS: &str = "login_attempts";
    /// Lockout expiry (Unix milliseconds, `0` when not locked)
    pub const LOGIN_LOCK_UNTIL: &str = "login_lock_until";
    /// Serialized provider session
    pub const AUTH_SESSION: &str = "auth_session";
}

/// Client-side string store that survives reloads of the same client.
///
/// Operations are synchronous and never fail from the caller's view;
/// implementations log write failures instead.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Profile records keyed by identity ID.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up one profile. A missing record is `Ok(None)`.
    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileError>;

    /// Create or merge a profile record.
    async fn upsert(&self, record: &ProfileUpsert) -> Result<(), ProfileError>;
}
