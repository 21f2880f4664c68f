// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity providers, session state and sign-in throttling.

pub mod identity;
pub mod local;
pub mod session;
pub mod supabase;
pub mod throttle;

pub use identity::{
    AuthEvent, AuthStateChange, AuthSubscription, CallbackParams, IdentityProvider,
};
pub use local::LocalIdentityProvider;
pub use session::{AuthState, SessionManager};
pub use supabase::SupabaseClient;
pub use throttle::{LoginThrottle, ThrottleConfig, ThrottleStatus};
