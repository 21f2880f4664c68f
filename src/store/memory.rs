// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory stores for tests and ephemeral clients.

use super::{KeyValueStore, ProfileStore};
use crate::error::ProfileError;
use crate::models::{Profile, ProfileUpsert};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Key-value store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Profile store backed by a concurrent map.
///
/// Can be switched offline to simulate backend outages.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<String, Profile>,
    offline: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record directly, as the backend would on sign-up.
    pub fn insert(&self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Current stored record, bypassing the offline switch.
    pub fn stored(&self, id: &str) -> Option<Profile> {
        self.profiles.get(id).map(|p| p.value().clone())
    }

    /// Make every operation fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `get_by_id` calls served (including failed ones).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), ProfileError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProfileError::Store(
                "Profile store not reachable (offline mode)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.stored(id))
    }

    async fn upsert(&self, record: &ProfileUpsert) -> Result<(), ProfileError> {
        self.check_online()?;
        self.profiles
            .entry(record.id.clone())
            .or_insert_with(|| Profile::new(record.id.clone()))
            .apply(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileChanges;
    use chrono::Utc;

    #[test]
    fn test_kv_roundtrip() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("a"), None);

        store.set("a", "1");
        assert_eq!(store.get("a").as_deref(), Some("1"));

        store.remove("a");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let store = MemoryProfileStore::new();
        let first = ProfileUpsert {
            id: "u1".to_string(),
            updated_at: Utc::now(),
            changes: ProfileChanges::new().first_name(Some("Ada")),
        };
        store.upsert(&first).await.unwrap();

        let second = ProfileUpsert {
            id: "u1".to_string(),
            updated_at: Utc::now(),
            changes: ProfileChanges::new().last_name(Some("Lovelace")),
        };
        store.upsert(&second).await.unwrap();

        let profile = store.get_by_id("u1").await.unwrap().unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(profile.role(), "USER");
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryProfileStore::new();
        store.insert(Profile::new("u1"));
        store.set_offline(true);

        assert!(matches!(
            store.get_by_id("u1").await,
            Err(ProfileError::Store(_))
        ));
        assert_eq!(store.reads(), 1);
    }
}
