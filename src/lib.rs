// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authgate: client-side authentication state for a small web application
//!
//! This crate tracks the signed-in identity and its profile record, decides
//! whether protected views may render, and throttles repeated failed
//! sign-ins.

pub mod config;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use forms::LoginForm;
use middleware::RouteGuard;
use services::{LoginThrottle, SessionManager};
use std::sync::Arc;

/// Shared client state.
pub struct AppState {
    pub config: Config,
    pub manager: Arc<SessionManager>,
    pub throttle: LoginThrottle,
    pub guard: RouteGuard,
}

impl AppState {
    pub fn login_form(&self) -> LoginForm {
        LoginForm::new(self.manager.clone(), self.throttle.clone())
    }
}
