//! Session model and expiry arithmetic
//!
//! Timestamps are unix milliseconds. Expiry is evaluated lazily: there is no
//! timer that flips a session from `Authenticated` to `ExpiringSoon`, the
//! phase is recomputed from `(now, expires_at)` whenever it is read.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};

/// Identity record of the signed-in user, as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    /// Login provider: "email", "google", "facebook"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    /// "First Last" when a name is known, otherwise the email address.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }

    /// Overwrite every field the patch carries.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if patch.first_name.is_some() {
            self.first_name = patch.first_name;
        }
        if patch.last_name.is_some() {
            self.last_name = patch.last_name;
        }
        if patch.avatar_url.is_some() {
            self.avatar_url = patch.avatar_url;
        }
        if patch.profile_picture.is_some() {
            self.profile_picture = patch.profile_picture;
        }
        if patch.provider.is_some() {
            self.provider = patch.provider;
        }
        if patch.is_verified.is_some() {
            self.is_verified = patch.is_verified;
        }
        if patch.created_at.is_some() {
            self.created_at = patch.created_at;
        }
    }
}

/// Partial user update. `id` is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_picture: Option<String>,
    pub provider: Option<String>,
    pub is_verified: Option<bool>,
    pub created_at: Option<String>,
}

impl From<User> for UserPatch {
    fn from(user: User) -> Self {
        Self {
            email: Some(user.email),
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.avatar_url,
            profile_picture: user.profile_picture,
            provider: user.provider,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Where a session sits in its lifecycle at a given instant.
///
/// Transitions:
/// - Anonymous → Authenticated (login via `set_auth`)
/// - Authenticated → ExpiringSoon (time passes; evaluated on read)
/// - Authenticated/ExpiringSoon → Refreshing (refresh started)
/// - Refreshing → Authenticated (refresh succeeded)
/// - Refreshing → Error (refresh failed, session cleared)
/// - Error → Anonymous (error flag acknowledged)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticated,
    ExpiringSoon,
    Refreshing,
    Error,
}

impl SessionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Anonymous => "anonymous",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::ExpiringSoon => "expiring_soon",
            SessionPhase::Refreshing => "refreshing",
            SessionPhase::Error => "error",
        }
    }
}

/// Read-only copy of the session state.
///
/// `access_token`, `user` and `expires_at` are always set or cleared together
/// by the store; `is_loading` and `error` are transient and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<Secret<String>>,
    /// Absolute expiry, unix milliseconds. `None` counts as expired.
    pub expires_at: Option<u64>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    /// Whether the token is expired or within `buffer` of expiring, now.
    pub fn needs_refresh(&self, buffer: Duration) -> bool {
        needs_refresh_at(self.expires_at, now_millis(), buffer)
    }

    /// Lifecycle phase at `now_millis`.
    pub fn phase_at(&self, now_millis: u64, buffer: Duration) -> SessionPhase {
        if self.access_token.is_none() {
            return if self.error.is_some() {
                SessionPhase::Error
            } else {
                SessionPhase::Anonymous
            };
        }
        if self.is_loading {
            SessionPhase::Refreshing
        } else if needs_refresh_at(self.expires_at, now_millis, buffer) {
            SessionPhase::ExpiringSoon
        } else {
            SessionPhase::Authenticated
        }
    }

    /// Persistable form, `None` when there is nothing worth keeping.
    pub(crate) fn snapshot(&self) -> Option<Snapshot> {
        if !self.is_authenticated() {
            return None;
        }
        Some(Snapshot {
            user: self.user.clone(),
            access_token: self.access_token.clone(),
            token_expires_at: self.expires_at,
        })
    }
}

/// On-disk session record: `{user, accessToken, tokenExpiresAt}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Snapshot {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub access_token: Option<Secret<String>>,
    #[serde(default)]
    pub token_expires_at: Option<u64>,
}

/// `true` iff `expires_at` is unknown or `now >= expires_at - buffer`.
pub fn needs_refresh_at(expires_at: Option<u64>, now_millis: u64, buffer: Duration) -> bool {
    match expires_at {
        None => true,
        Some(expires_at) => {
            let buffer_millis = buffer.as_millis() as u64;
            now_millis >= expires_at.saturating_sub(buffer_millis)
        }
    }
}

/// Absolute expiry for a token issued now with a lifetime of `expires_in_secs`.
pub(crate) fn expiry_from_now(expires_in_secs: u64) -> u64 {
    now_millis().saturating_add(expires_in_secs.saturating_mul(1000))
}

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
