// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side sign-in throttle.
//!
//! Counts consecutive failed sign-ins in the persisted attempt store and
//! refuses further submissions for a fixed period once the limit is hit.
//! This only slows down casual retry loops from one client; the identity
//! provider still enforces its own server-side limits.
//!
//! States are derived from the stored counters and the clock:
//! - `Open`: no lockout in force; failures increment the count.
//! - `Locked`: `locked_until` is in the future; submissions are refused.
//!
//! Expiry needs no write: once the clock passes `locked_until` the throttle
//! reads as open again, and the stale counters are cleared on the next
//! failure.

use crate::error::LockedOut;
use crate::store::{AttemptState, AttemptStore};
use crate::time_utils::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Default failed attempts before lockout.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default lockout length in seconds.
pub const DEFAULT_LOCK_SECS: i64 = 5 * 60;

/// Throttle limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Failed attempts that trigger a lockout
    pub max_attempts: u32,
    pub lock_duration: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_duration: Duration::seconds(DEFAULT_LOCK_SECS),
        }
    }
}

/// Current throttle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleStatus {
    Open {
        /// Consecutive failures so far
        attempts: u32,
        /// Failures left before lockout
        remaining_attempts: u32,
    },
    Locked {
        until: DateTime<Utc>,
        remaining: Duration,
    },
}

impl ThrottleStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, ThrottleStatus::Locked { .. })
    }
}

/// Sign-in throttle over the shared attempt store.
///
/// Instances are cheap; every instance built on the same key-value store
/// sees the same counters.
#[derive(Clone)]
pub struct LoginThrottle {
    store: AttemptStore,
    config: ThrottleConfig,
    clock: Arc<dyn Clock>,
}

impl LoginThrottle {
    pub fn new(store: AttemptStore, config: ThrottleConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: AttemptStore, config: ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn status(&self) -> ThrottleStatus {
        let now = self.clock.now();
        let state = self.store.read();
        self.status_at(&state, now)
    }

    pub fn is_locked(&self) -> bool {
        self.status().is_locked()
    }

    /// Time left on the current lockout, if any.
    pub fn remaining_lockout(&self) -> Option<Duration> {
        match self.status() {
            ThrottleStatus::Locked { remaining, .. } => Some(remaining),
            ThrottleStatus::Open { .. } => None,
        }
    }

    /// Pre-submission check; call before contacting the provider.
    pub fn check(&self) -> Result<(), LockedOut> {
        match self.remaining_lockout() {
            Some(remaining) => Err(LockedOut { remaining }),
            None => Ok(()),
        }
    }

    /// Record a failed sign-in and return the resulting status.
    ///
    /// Failures while locked do not extend the lockout.
    pub fn record_failure(&self) -> ThrottleStatus {
        let now = self.clock.now();
        let state = self.store.read();

        if state.is_locked_at(now) {
            return self.status_at(&state, now);
        }
        if state.locked_until.is_some() {
            // The previous lockout has run out; start counting afresh.
            self.store.reset();
        }

        let count = self.store.increment();
        if count >= self.config.max_attempts {
            let until = now + self.config.lock_duration;
            self.store.set_count(self.config.max_attempts);
            self.store.lock_until(until);
            tracing::warn!(
                attempts = count,
                locked_until = %until,
                "Too many failed sign-in attempts, locking sign-in"
            );
            return ThrottleStatus::Locked {
                until,
                remaining: self.config.lock_duration,
            };
        }

        tracing::debug!(attempts = count, "Failed sign-in attempt recorded");
        ThrottleStatus::Open {
            attempts: count,
            remaining_attempts: self.config.max_attempts - count,
        }
    }

    /// Record a successful sign-in, clearing all counters.
    pub fn record_success(&self) {
        self.store.reset();
    }

    fn status_at(&self, state: &AttemptState, now: DateTime<Utc>) -> ThrottleStatus {
        match state.locked_until {
            Some(until) if until > now => ThrottleStatus::Locked {
                until,
                remaining: until - now,
            },
            // An expired lockout counts as cleared.
            Some(_) => ThrottleStatus::Open {
                attempts: 0,
                remaining_attempts: self.config.max_attempts,
            },
            None => {
                let attempts = state.count.min(self.config.max_attempts);
                ThrottleStatus::Open {
                    attempts,
                    remaining_attempts: self.config.max_attempts - attempts,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use crate::time_utils::ManualClock;

    fn throttle() -> (LoginThrottle, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = AttemptStore::new(Arc::new(MemoryKvStore::new()));
        let throttle = LoginThrottle::with_clock(store, ThrottleConfig::default(), clock.clone());
        (throttle, clock)
    }

    #[test]
    fn test_open_until_limit() {
        let (throttle, _) = throttle();

        for n in 1..DEFAULT_MAX_ATTEMPTS {
            let status = throttle.record_failure();
            assert_eq!(
                status,
                ThrottleStatus::Open {
                    attempts: n,
                    remaining_attempts: DEFAULT_MAX_ATTEMPTS - n,
                }
            );
        }
        assert!(!throttle.is_locked());

        assert!(throttle.record_failure().is_locked());
        assert!(throttle.is_locked());
        assert_eq!(
            throttle.remaining_lockout(),
            Some(Duration::seconds(DEFAULT_LOCK_SECS))
        );
    }

    #[test]
    fn test_failure_while_locked_does_not_extend() {
        let (throttle, clock) = throttle();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            throttle.record_failure();
        }
        clock.advance(Duration::minutes(1));
        throttle.record_failure();

        assert_eq!(throttle.remaining_lockout(), Some(Duration::minutes(4)));
    }

    #[test]
    fn test_lock_expires_with_clock() {
        let (throttle, clock) = throttle();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            throttle.record_failure();
        }

        clock.advance(Duration::seconds(DEFAULT_LOCK_SECS) - Duration::milliseconds(1));
        assert!(throttle.is_locked());

        clock.advance(Duration::milliseconds(1));
        assert!(!throttle.is_locked());
        assert!(throttle.check().is_ok());

        // Counting restarts after an expired lockout.
        assert_eq!(
            throttle.record_failure(),
            ThrottleStatus::Open {
                attempts: 1,
                remaining_attempts: DEFAULT_MAX_ATTEMPTS - 1,
            }
        );
    }

    #[test]
    fn test_success_resets() {
        let (throttle, _) = throttle();
        throttle.record_failure();
        throttle.record_failure();
        throttle.record_success();

        assert_eq!(
            throttle.status(),
            ThrottleStatus::Open {
                attempts: 0,
                remaining_attempts: DEFAULT_MAX_ATTEMPTS,
            }
        );
    }
}
