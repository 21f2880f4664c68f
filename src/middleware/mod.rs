// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route access middleware.

pub mod guard;

pub use guard::{evaluate, Access, Navigation, RouteGuard};
