// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in / sign-up form.
//!
//! Sign-in goes through the throttle: a locked throttle refuses the
//! submission before the provider is contacted, and every provider answer
//! is fed back as a failure or success.

use super::first_message;
use crate::error::LoginError;
use crate::models::Session;
use crate::services::{LoginThrottle, SessionManager, ThrottleStatus};
use std::sync::Arc;
use validator::Validate;

/// Email and password as typed.
#[derive(Debug, Clone, Validate)]
pub struct Credentials {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    /// Check the input before anything is sent anywhere.
    pub fn check(&self) -> Result<(), LoginError> {
        self.validate()
            .map_err(|e| LoginError::InvalidInput(first_message(&e, &["email", "password"])))
    }
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// Account created; the user must follow the emailed link first
    ConfirmationRequired,
}

/// Sign-in page logic.
pub struct LoginForm {
    manager: Arc<SessionManager>,
    throttle: LoginThrottle,
}

impl LoginForm {
    pub fn new(manager: Arc<SessionManager>, throttle: LoginThrottle) -> Self {
        Self { manager, throttle }
    }

    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    /// Whether the submit button should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.throttle.is_locked()
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, LoginError> {
        self.throttle.check()?;
        credentials.check()?;

        match self
            .manager
            .sign_in(&credentials.email, &credentials.password)
            .await
        {
            Ok(session) => {
                self.throttle.record_success();
                tracing::info!(user_id = %session.user_id(), "Signed in");
                Ok(session)
            }
            Err(error) => match self.throttle.record_failure() {
                ThrottleStatus::Locked { remaining, .. } => {
                    Err(LoginError::RejectedAndLocked { error, remaining })
                }
                ThrottleStatus::Open {
                    attempts,
                    remaining_attempts,
                } => {
                    tracing::info!(attempts, remaining_attempts, error = %error, "Sign-in rejected");
                    Err(LoginError::Rejected { error })
                }
            },
        }
    }

    /// Create an account. Not throttled.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, LoginError> {
        credentials.check()?;

        let result = self
            .manager
            .sign_up(&credentials.email, &credentials.password)
            .await?;

        Ok(match result.session {
            Some(session) => SignUpOutcome::SignedIn(session),
            None => SignUpOutcome::ConfirmationRequired,
        })
    }

    pub async fn send_magic_link(&self, email: &str) -> Result<(), LoginError> {
        let email = checked_email(email)?;
        self.manager.send_magic_link(&email).await?;
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), LoginError> {
        let email = checked_email(email)?;
        self.manager.send_password_reset(&email).await?;
        Ok(())
    }
}

fn checked_email(email: &str) -> Result<String, LoginError> {
    use validator::ValidateEmail;

    let email = email.trim();
    if !email.validate_email() {
        return Err(LoginError::InvalidInput(
            "Enter a valid email address".to_string(),
        ));
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_validation() {
        assert!(Credentials::new(" ada@example.com ", "secret").check().is_ok());

        assert_eq!(
            Credentials::new("not-an-email", "secret").check(),
            Err(LoginError::InvalidInput(
                "Enter a valid email address".to_string()
            ))
        );
        assert_eq!(
            Credentials::new("ada@example.com", "").check(),
            Err(LoginError::InvalidInput("Password is required".to_string()))
        );
    }

    #[test]
    fn test_checked_email() {
        assert_eq!(checked_email(" a@b.co ").unwrap(), "a@b.co");
        assert!(checked_email("").is_err());
    }
}
