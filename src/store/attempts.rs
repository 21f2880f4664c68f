// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted failed sign-in counters.
//!
//! The counters are global to the client rather than per identity, since
//! nobody is authenticated yet when they are written. There is no locking:
//! writes come from one user-driven form submission at a time, so
//! last-write-wins is acceptable.

use super::{keys, KeyValueStore};
use crate::time_utils::from_unix_millis;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Snapshot of the persisted counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptState {
    /// Consecutive failed sign-ins
    pub count: u32,
    /// Lockout expiry, `None` when never locked or after a reset
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// Lockout in force at `now`.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Read/increment/reset access to the two persisted counter keys.
#[derive(Clone)]
pub struct AttemptStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AttemptStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn read(&self) -> AttemptState {
        let count = self.read_int(keys::LOGIN_ATTEMPTS).max(0);
        let locked_until = match self.read_int(keys::LOGIN_LOCK_UNTIL) {
            0 => None,
            millis => from_unix_millis(millis),
        };

        AttemptState {
            count: u32::try_from(count).unwrap_or(u32::MAX),
            locked_until,
        }
    }

    /// Add one failed attempt and return the new count.
    pub fn increment(&self) -> u32 {
        let count = self.read().count.saturating_add(1);
        self.set_count(count);
        count
    }

    pub fn set_count(&self, count: u32) {
        self.kv.set(keys::LOGIN_ATTEMPTS, &count.to_string());
    }

    pub fn lock_until(&self, until: DateTime<Utc>) {
        self.kv
            .set(keys::LOGIN_LOCK_UNTIL, &until.timestamp_millis().to_string());
    }

    /// Clear both counters.
    pub fn reset(&self) {
        self.kv.remove(keys::LOGIN_ATTEMPTS);
        self.kv.remove(keys::LOGIN_LOCK_UNTIL);
    }

    fn read_int(&self, key: &str) -> i64 {
        let Some(raw) = self.kv.get(key) else {
            return 0;
        };
        raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable attempt counter");
            0
        })
    }
}
