// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile editor.

use super::first_message;
use crate::error::ProfileError;
use crate::models::{Profile, ProfileChanges};
use crate::services::SessionManager;
use validator::Validate;

/// Editable profile fields, as typed. Empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct ProfileForm {
    #[validate(length(max = 100, message = "First name is too long"))]
    pub first_name: String,
    #[validate(length(max = 100, message = "Last name is too long"))]
    pub last_name: String,
    #[validate(url(message = "Avatar URL must be a valid URL"))]
    pub avatar_url: Option<String>,
}

impl ProfileForm {
    /// Form prefilled from the cached profile.
    pub fn from_profile(profile: Option<&Profile>) -> Self {
        let mut form = Self::default();
        form.revert(profile);
        form
    }

    /// Discard edits and reload from the cached profile.
    pub fn revert(&mut self, profile: Option<&Profile>) {
        self.first_name = profile
            .and_then(|p| p.first_name.clone())
            .unwrap_or_default();
        self.last_name = profile
            .and_then(|p| p.last_name.clone())
            .unwrap_or_default();
        self.avatar_url = profile
            .and_then(|p| p.avatar_url.clone())
            .filter(|u| !u.is_empty());
    }

    pub fn set_avatar_url(&mut self, url: &str) {
        let url = url.trim();
        self.avatar_url = (!url.is_empty()).then(|| url.to_string());
    }

    /// Changes to write; blank fields are cleared.
    pub fn changes(&self) -> Result<ProfileChanges, ProfileError> {
        self.validate().map_err(|e| {
            ProfileError::Invalid(first_message(&e, &["avatar_url", "first_name", "last_name"]))
        })?;

        Ok(ProfileChanges::new()
            .first_name(non_empty(&self.first_name))
            .last_name(non_empty(&self.last_name))
            .avatar_url(self.avatar_url.as_deref().and_then(non_empty)))
    }

    /// Save the form, then reload the cached profile.
    pub async fn submit(&self, manager: &SessionManager) -> Result<(), ProfileError> {
        let changes = self.changes()?;
        manager.update_profile(changes).await?;
        manager.refresh_profile().await;
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
