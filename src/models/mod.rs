// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for sessions and user profiles.

pub mod profile;
pub mod session;

pub use profile::{
    display_name, initials, Profile, ProfileChanges, ProfileUpsert, ADMIN_ROLE, DEFAULT_ROLE,
};
pub use session::{Identity, Session, SignUpResult};
