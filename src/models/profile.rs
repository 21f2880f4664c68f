// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model for storage and display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::Identity;

/// Role assumed when a profile has none (or there is no profile at all).
pub const DEFAULT_ROLE: &str = "USER";
pub const ADMIN_ROLE: &str = "ADMIN";

/// User profile record, keyed by identity ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity ID (also the record key)
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Public avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Access-control tag; see [`Profile::role`]
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Empty profile for an identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            avatar_url: None,
            role: None,
            updated_at: None,
        }
    }

    /// Effective role, `USER` when unset.
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(DEFAULT_ROLE)
    }

    /// Merge an upsert into this record.
    pub fn apply(&mut self, upsert: &ProfileUpsert) {
        let changes = &upsert.changes;
        if let Some(first_name) = &changes.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(avatar_url) = &changes.avatar_url {
            self.avatar_url = avatar_url.clone();
        }
        if let Some(role) = &changes.role {
            self.role = role.clone();
        }
        self.updated_at = Some(upsert.updated_at);
    }
}

/// Partial profile update.
///
/// `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Option<String>>,
}

impl ProfileChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_name(mut self, value: Option<impl Into<String>>) -> Self {
        self.first_name = Some(value.map(Into::into));
        self
    }

    pub fn last_name(mut self, value: Option<impl Into<String>>) -> Self {
        self.last_name = Some(value.map(Into::into));
        self
    }

    pub fn avatar_url(mut self, value: Option<impl Into<String>>) -> Self {
        self.avatar_url = Some(value.map(Into::into));
        self
    }

    pub fn role(mut self, value: Option<impl Into<String>>) -> Self {
        self.role = Some(value.map(Into::into));
        self
    }
}

/// Record written to the profile store: the changes stamped with owner and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpsert {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub changes: ProfileChanges,
}

/// Name to show for the signed-in user.
///
/// First name, then last name, then the local part of the email, then `"User"`.
pub fn display_name(identity: Option<&Identity>, profile: Option<&Profile>) -> String {
    let non_empty = |v: Option<&String>| v.filter(|s| !s.is_empty()).cloned();

    profile
        .and_then(|p| non_empty(p.first_name.as_ref()).or_else(|| non_empty(p.last_name.as_ref())))
        .or_else(|| {
            identity
                .and_then(|i| i.email.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "User".to_string())
}

/// Single upper-case letter for avatar placeholders.
pub fn initials(identity: Option<&Identity>, profile: Option<&Profile>) -> String {
    let first = profile
        .and_then(|p| p.first_name.as_deref())
        .and_then(|name| name.chars().next())
        .or_else(|| display_name(identity, profile).chars().next())
        .unwrap_or('U');
    first.to_uppercase().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> Identity {
        Identity {
            id: "u1".to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_role_defaults_to_user() {
        let mut profile = Profile::new("u1");
        assert_eq!(profile.role(), DEFAULT_ROLE);

        profile.role = Some(ADMIN_ROLE.to_string());
        assert_eq!(profile.role(), "ADMIN");
    }

    #[test]
    fn test_apply_merges_only_changed_fields() {
        let mut profile = Profile::new("u1");
        profile.first_name = Some("Ada".to_string());
        profile.last_name = Some("Lovelace".to_string());

        let now = Utc::now();
        profile.apply(&ProfileUpsert {
            id: "u1".to_string(),
            updated_at: now,
            changes: ProfileChanges::new()
                .last_name(None::<String>)
                .avatar_url(Some("https://example.com/a.png")),
        });

        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.last_name, None);
        assert_eq!(profile.avatar_url.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(profile.updated_at, Some(now));
    }

    #[test]
    fn test_upsert_serializes_only_changes() {
        let upsert = ProfileUpsert {
            id: "u1".to_string(),
            updated_at: Utc::now(),
            changes: ProfileChanges::new().first_name(None::<String>),
        };
        let json = serde_json::to_value(&upsert).unwrap();

        assert_eq!(json["id"], "u1");
        assert!(json["first_name"].is_null());
        assert!(json.get("first_name").is_some());
        assert!(json.get("last_name").is_none());
        assert!(json.get("updated_at").is_some());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut profile = Profile::new("u1");
        let ident = identity("ada@example.com");

        assert_eq!(display_name(Some(&ident), Some(&profile)), "ada");

        profile.last_name = Some("Lovelace".to_string());
        assert_eq!(display_name(Some(&ident), Some(&profile)), "Lovelace");

        profile.first_name = Some("Ada".to_string());
        assert_eq!(display_name(Some(&ident), Some(&profile)), "Ada");

        assert_eq!(display_name(None, None), "User");
    }

    #[test]
    fn test_initials() {
        let ident = identity("zed@example.com");
        assert_eq!(initials(Some(&ident), None), "Z");

        let mut profile = Profile::new("u1");
        profile.first_name = Some("ada".to_string());
        assert_eq!(initials(Some(&ident), Some(&profile)), "A");

        assert_eq!(initials(None, None), "U");
    }
}
