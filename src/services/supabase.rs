// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for a hosted auth + profile backend (GoTrue / PostgREST style).
//!
//! Handles:
//! - Password sign-in, sign-up and sign-out
//! - Magic-link and password-reset emails, and redirect completion
//! - Session persistence in the client key-value store
//! - Refresh of an expired session on startup
//! - Profile reads and upserts against the `profiles` table

use super::identity::{
    AuthEvent, AuthStateChange, AuthSubscription, CallbackParams, IdentityProvider,
    EVENT_CHANNEL_CAPACITY,
};
use crate::config::Config;
use crate::error::{AuthError, ProfileError};
use crate::models::{Identity, Profile, ProfileUpsert, Session, SignUpResult};
use crate::store::{keys, KeyValueStore, ProfileStore};
use crate::time_utils::from_unix_millis;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const DEFAULT_HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const PROFILES_TABLE: &str = "profiles";

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    expires_at: Option<i64>,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<WireUser> for Identity {
    fn from(user: WireUser) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|secs| from_unix_millis(secs.saturating_mul(1000)))
            .or_else(|| token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.into(),
        }
    }
}

/// Error body; different endpoints use different field names.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client for the hosted backend.
///
/// Implements both [`IdentityProvider`] and [`ProfileStore`].
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    redirect_url: Option<String>,
    storage: Arc<dyn KeyValueStore>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl SupabaseClient {
    /// Create a client, restoring any session persisted in `storage`.
    pub fn new(config: &Config, storage: Arc<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building auth HTTP client")?;

        let session = storage
            .get(keys::AUTH_SESSION)
            .and_then(|raw| match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable persisted session");
                    None
                }
            });

        tracing::info!(
            base_url = %config.provider_url,
            restored_session = session.is_some(),
            "Initialized auth client"
        );

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.provider_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            redirect_url: config.redirect_url.clone(),
            storage,
            session: RwLock::new(session),
            events,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn held_session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Token for data requests: the user's access token, else the anon key.
    fn bearer(&self) -> String {
        self.held_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Replace the held session, persist it and notify subscribers.
    fn set_session(&self, event: AuthEvent, session: Option<Session>) {
        match &session {
            Some(s) => match serde_json::to_string(s) {
                Ok(json) => self.storage.set(keys::AUTH_SESSION, &json),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize session"),
            },
            None => self.storage.remove(keys::AUTH_SESSION),
        }
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session.clone();

        tracing::info!(
            event = ?event,
            user_id = session.as_ref().map(|s| s.user.id.as_str()).unwrap_or("<none>"),
            "Auth state changed"
        );
        let _ = self.events.send(AuthStateChange::new(event, session));
    }

    fn with_redirect(&self, url: String) -> String {
        match &self.redirect_url {
            Some(redirect) => format!("{}?redirect_to={}", url, urlencoding::encode(redirect)),
            None => url,
        }
    }

    /// POST a JSON body to an auth endpoint.
    async fn post_auth<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, AuthError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        check_auth_response(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let url = self.auth_url("token?grant_type=refresh_token");
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self.post_auth(&url, &body, None).await?;
        let token: TokenResponse = parse_json(response).await?;
        Ok(token.into())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.held_session() else {
            return Ok(None);
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            self.set_session(AuthEvent::SignedOut, None);
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(fresh) => {
                self.set_session(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(AuthError::Unavailable(msg)) => Err(AuthError::Unavailable(msg)),
            Err(e) => {
                tracing::info!(error = %e, "Stored session could not be refreshed");
                self.set_session(AuthEvent::SignedOut, None);
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = self.auth_url("token?grant_type=password");
        let response = self
            .post_auth(&url, &Credentials { email, password }, None)
            .await?;
        let session: Session = parse_json::<TokenResponse>(response).await?.into();

        self.set_session(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpResult, AuthError> {
        let url = self.with_redirect(self.auth_url("signup"));
        let response = self
            .post_auth(&url, &Credentials { email, password }, None)
            .await?;
        let body: serde_json::Value = parse_json(response).await?;

        let result = classify_sign_up(body)?;
        if let Some(session) = &result.session {
            self.set_session(AuthEvent::SignedIn, Some(session.clone()));
        }
        Ok(result)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.held_session() else {
            self.set_session(AuthEvent::SignedOut, None);
            return Ok(());
        };

        let url = self.auth_url("logout");
        match self
            .post_auth(&url, &serde_json::json!({}), Some(session.access_token.as_str()))
            .await
        {
            // An already-invalid token still means we are signed out.
            Ok(_) | Err(AuthError::InvalidCredentials) => {
                self.set_session(AuthEvent::SignedOut, None);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        let url = self.with_redirect(self.auth_url("otp"));
        let body = serde_json::json!({ "email": email, "create_user": true });
        self.post_auth(&url, &body, None).await?;
        tracing::info!("Magic link requested");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let url = self.with_redirect(self.auth_url("recover"));
        let body = serde_json::json!({ "email": email });
        self.post_auth(&url, &body, None).await?;
        tracing::info!("Password reset requested");
        Ok(())
    }

    async fn session_from_url(&self, url: &str) -> Result<Option<Session>, AuthError> {
        let params = CallbackParams::parse(url);
        if let Some(description) = params.error_description {
            return Err(AuthError::Provider(description));
        }
        let Some(access_token) = params.access_token else {
            return Ok(None);
        };

        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        let user: WireUser = parse_json(check_auth_response(response).await?).await?;

        let session = Session {
            access_token,
            refresh_token: params.refresh_token,
            expires_at: params
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            user: user.into(),
        };
        self.set_session(AuthEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_by_id(&self, id: &str) -> Result<Option<Profile>, ProfileError> {
        let url = self.rest_url(&format!(
            "{}?id=eq.{}&select=*",
            PROFILES_TABLE,
            urlencoding::encode(id)
        ));

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| ProfileError::Store(e.to_string()))?;

        let response = check_store_response(response).await?;
        let mut rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| ProfileError::Store(format!("Invalid profile response: {}", e)))?;

        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn upsert(&self, record: &ProfileUpsert) -> Result<(), ProfileError> {
        let response = self
            .http
            .post(self.rest_url(PROFILES_TABLE))
            .header("apikey", &self.anon_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(self.bearer())
            .json(record)
            .send()
            .await
            .map_err(|e| ProfileError::Store(e.to_string()))?;

        check_store_response(response).await?;
        Ok(())
    }
}

/// Check an auth response and map failures onto [`AuthError`].
async fn check_auth_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let err = map_auth_error(status, &body);
    tracing::debug!(status, error = %err, "Auth request rejected");
    Err(err)
}

async fn check_store_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProfileError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ProfileError::Store(format!("HTTP {}: {}", status, body)))
}

async fn parse_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AuthError> {
    response
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("Unexpected auth response: {}", e)))
}

/// Interpret a sign-up response body.
///
/// With auto-confirm the body is a token grant, otherwise the new user.
fn classify_sign_up(body: serde_json::Value) -> Result<SignUpResult, AuthError> {
    if body.get("access_token").is_none() {
        return Ok(SignUpResult {
            session: None,
            user_created: body.get("id").is_some(),
        });
    }

    let token: TokenResponse = serde_json::from_value(body)
        .map_err(|e| AuthError::Provider(format!("Unexpected sign-up response: {}", e)))?;
    Ok(SignUpResult {
        session: Some(token.into()),
        user_created: true,
    })
}

/// Map an auth error response onto [`AuthError`].
fn map_auth_error(status: u16, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed
        .error_code
        .clone()
        .or_else(|| parsed.error.clone())
        .unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {}", status));
    let lowered = message.to_lowercase();

    if status == 429 {
        return AuthError::RateLimited;
    }
    if status >= 500 {
        return AuthError::Unavailable(message);
    }
    if code == "email_not_confirmed" || lowered.contains("email not confirmed") {
        return AuthError::EmailNotConfirmed;
    }
    if code == "invalid_credentials"
        || code == "invalid_grant"
        || lowered.contains("invalid login credentials")
        || status == 401
    {
        return AuthError::InvalidCredentials;
    }
    AuthError::Provider(message)
}
