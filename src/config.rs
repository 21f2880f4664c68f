// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.

use crate::middleware::RouteGuard;
use crate::services::ThrottleConfig;
use chrono::Duration;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Identity / profile backend ---
    /// Base URL of the hosted backend
    pub provider_url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
    /// Landing URL for magic-link and password-reset emails
    pub redirect_url: Option<String>,

    // --- Client state ---
    /// File backing the persisted key-value store
    pub storage_path: PathBuf,
    pub max_login_attempts: u32,
    pub lockout_secs: i64,

    // --- Routes ---
    pub sign_in_path: String,
    pub home_path: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:54321".to_string(),
            anon_key: "test_anon_key".to_string(),
            redirect_url: None,
            storage_path: PathBuf::from(".authgate/storage.json"),
            max_login_attempts: 5,
            lockout_secs: 300,
            sign_in_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            provider_url: required("AUTHGATE_PROVIDER_URL")?,
            anon_key: required("AUTHGATE_ANON_KEY")?,
            redirect_url: env::var("AUTHGATE_REDIRECT_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            storage_path: env::var("AUTHGATE_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            max_login_attempts: parsed("AUTHGATE_MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts)?,
            lockout_secs: parsed("AUTHGATE_LOCKOUT_SECS", defaults.lockout_secs)?,
            sign_in_path: env::var("AUTHGATE_SIGN_IN_PATH").unwrap_or(defaults.sign_in_path),
            home_path: env::var("AUTHGATE_HOME_PATH").unwrap_or(defaults.home_path),
        };

        if config.max_login_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "AUTHGATE_MAX_LOGIN_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        if config.lockout_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "AUTHGATE_LOCKOUT_SECS",
                value: config.lockout_secs.to_string(),
            });
        }

        Ok(config)
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            max_attempts: self.max_login_attempts,
            lock_duration: Duration::seconds(self.lockout_secs),
        }
    }

    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(&self.sign_in_path, &self.home_path)
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parsed<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the environment is not mutated concurrently.
    #[test]
    fn test_config_from_env() {
        env::set_var("AUTHGATE_PROVIDER_URL", "https://project.example.co");
        env::set_var("AUTHGATE_ANON_KEY", "anon");
        env::remove_var("AUTHGATE_MAX_LOGIN_ATTEMPTS");
        env::set_var("AUTHGATE_LOCKOUT_SECS", "60");

        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.provider_url, "https://project.example.co");
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(
            config.throttle_config().lock_duration,
            Duration::seconds(60)
        );

        env::set_var("AUTHGATE_MAX_LOGIN_ATTEMPTS", "lots");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid {
                var: "AUTHGATE_MAX_LOGIN_ATTEMPTS",
                ..
            })
        ));

        env::remove_var("AUTHGATE_MAX_LOGIN_ATTEMPTS");
        env::remove_var("AUTHGATE_ANON_KEY");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("AUTHGATE_ANON_KEY"))
        ));
        env::remove_var("AUTHGATE_LOCKOUT_SECS");
    }

    #[test]
    fn test_route_guard_from_config() {
        let guard = Config::default().route_guard();
        assert_eq!(guard.sign_in_path, "/login");
        assert_eq!(guard.home_path, "/");
    }
}
