//! Session store: the single writer of session state
//!
//! All mutations take the state lock, apply the change in memory, write (or
//! remove) the persisted snapshot, publish the new state to subscribers, and
//! only then release the lock. Readers go through the same lock, so no task
//! can observe an in-memory state that disagrees with what is on disk.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::constants::{REFRESH_BUFFER, SESSION_EXPIRED_MESSAGE, SNAPSHOT_KEY};
use crate::coordinator::RefreshCoordinator;
use crate::persisted::PersistedStore;
use crate::session::{
    Session, SessionPhase, Snapshot, User, UserPatch, expiry_from_now, needs_refresh_at,
    now_millis,
};
use crate::token::RefreshGrant;

/// Owner of the process-wide session.
///
/// Share it as `Arc<SessionStore>`; every method takes `&self`.
pub struct SessionStore {
    state: Mutex<Session>,
    persisted: Arc<dyn PersistedStore>,
    changes: watch::Sender<Session>,
    refresh_buffer: Duration,
}

impl SessionStore {
    /// Create an anonymous store backed by `persisted`.
    ///
    /// Nothing is read from storage until `initialize()`.
    pub fn new(persisted: Arc<dyn PersistedStore>) -> Self {
        let (changes, _) = watch::channel(Session::default());
        Self {
            state: Mutex::new(Session::default()),
            persisted,
            changes,
            refresh_buffer: REFRESH_BUFFER,
        }
    }

    /// Override how long before expiry a token is considered due.
    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn refresh_buffer(&self) -> Duration {
        self.refresh_buffer
    }

    /// Receive every committed state. The current value is available
    /// immediately via `borrow()`.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.changes.subscribe()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Session {
        self.state.lock().await.clone()
    }

    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.state.lock().await.access_token.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.lock().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_authenticated()
    }

    /// `true` iff expiry is unknown or within the refresh buffer.
    pub async fn needs_refresh(&self) -> bool {
        let expires_at = self.state.lock().await.expires_at;
        needs_refresh_at(expires_at, now_millis(), self.refresh_buffer)
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state
            .lock()
            .await
            .phase_at(now_millis(), self.refresh_buffer)
    }

    /// Replace the session after a login. Expiry is `now + expires_in_secs`.
    pub async fn set_auth(
        &self,
        user: User,
        access_token: impl Into<Secret<String>>,
        expires_in_secs: u64,
    ) {
        let access_token = access_token.into();
        let user_id = user.id.clone();
        self.commit(true, move |state| {
            *state = Session {
                user: Some(user),
                access_token: Some(access_token),
                expires_at: Some(expiry_from_now(expires_in_secs)),
                is_loading: false,
                error: None,
            };
        })
        .await;
        info!(user_id, expires_in_secs, "session established");
    }

    /// Drop the session and its snapshot. Safe to call when already anonymous.
    pub async fn clear_auth(&self) {
        self.commit(true, |state| *state = Session::default()).await;
        debug!("session cleared");
    }

    /// Drop the session and record why, for the UI to surface.
    pub async fn clear_auth_with_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.commit(true, move |state| {
            *state = Session {
                error: Some(error),
                ..Session::default()
            };
        })
        .await;
        info!("session cleared after failed refresh");
    }

    /// Swap in a new token, keeping the current user.
    ///
    /// Returns `false` (and changes nothing) when no user is signed in: a
    /// token without an identity is not a usable session.
    pub async fn update_token(
        &self,
        access_token: impl Into<Secret<String>>,
        expires_in_secs: u64,
    ) -> bool {
        let access_token = access_token.into();
        self.commit(true, move |state| {
            if state.user.is_none() {
                return false;
            }
            state.access_token = Some(access_token);
            state.expires_at = Some(expiry_from_now(expires_in_secs));
            state.is_loading = false;
            state.error = None;
            true
        })
        .await
    }

    /// Merge `patch` into the signed-in user. No-op when anonymous.
    pub async fn update_user(&self, patch: UserPatch) -> bool {
        self.commit(true, move |state| match state.user.as_mut() {
            Some(user) => {
                user.apply(patch);
                true
            }
            None => false,
        })
        .await
    }

    /// Write a refresh outcome: new token and expiry, plus user fields when
    /// the response carried them. Check and write happen under one lock so a
    /// concurrent logout cannot be resurrected by a late refresh.
    pub async fn apply_refresh(&self, grant: &RefreshGrant) -> bool {
        let grant = grant.clone();
        self.commit(true, move |state| {
            let Some(user) = state.user.as_mut() else {
                return false;
            };
            if let Some(fresh) = grant.user {
                user.apply(fresh.into());
            }
            state.access_token = Some(grant.access_token);
            state.expires_at = Some(expiry_from_now(grant.expires_in));
            state.is_loading = false;
            state.error = None;
            true
        })
        .await
    }

    /// Transient loading flag. Not persisted.
    pub async fn set_loading(&self, is_loading: bool) {
        self.commit(false, move |state| state.is_loading = is_loading)
            .await;
    }

    /// Transient error flag. Clearing it settles `Error` into `Anonymous`.
    pub async fn set_error(&self, error: Option<String>) {
        self.commit(false, move |state| state.error = error).await;
    }

    /// Restore the persisted session at startup.
    ///
    /// A valid snapshot is restored as-is. An expired one is restored and
    /// then refreshed once through `coordinator`; if that fails the session
    /// is cleared with an error flag. Missing, unreadable or malformed
    /// snapshots leave the store anonymous. Never fails.
    pub async fn initialize(&self, coordinator: &RefreshCoordinator) -> SessionPhase {
        let Some(snapshot) = self.load_snapshot().await else {
            return self.phase().await;
        };

        let (Some(user), Some(access_token)) = (snapshot.user, snapshot.access_token) else {
            debug!("persisted snapshot has no usable session, ignoring");
            self.clear_auth().await;
            return self.phase().await;
        };

        let expires_at = snapshot.token_expires_at;
        let expired = needs_refresh_at(expires_at, now_millis(), self.refresh_buffer);
        let user_id = user.id.clone();

        self.commit(false, move |state| {
            *state = Session {
                user: Some(user),
                access_token: Some(access_token),
                expires_at,
                is_loading: false,
                error: None,
            };
        })
        .await;

        if !expired {
            info!(user_id, "restored persisted session");
            return self.phase().await;
        }

        info!(user_id, "persisted session expired, attempting refresh");
        match coordinator.refresh().await {
            Ok(_) => info!(user_id, "startup refresh succeeded"),
            Err(e) => {
                warn!(user_id, error = %e, "startup refresh failed, clearing session");
                self.clear_auth_with_error(SESSION_EXPIRED_MESSAGE).await;
            }
        }
        self.phase().await
    }

    /// Read and decode the snapshot. Any failure is logged and treated as
    /// "no session".
    async fn load_snapshot(&self) -> Option<Snapshot> {
        let raw = match self.persisted.load(SNAPSHOT_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no persisted session");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "failed to read persisted session");
                return None;
            }
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "discarding malformed persisted session");
                if let Err(e) = self.persisted.remove(SNAPSHOT_KEY).await {
                    warn!(error = %e, "failed to remove malformed persisted session");
                }
                None
            }
        }
    }

    /// Apply `mutate` under the state lock, optionally persist, then publish.
    async fn commit<R>(&self, persist: bool, mutate: impl FnOnce(&mut Session) -> R) -> R {
        let mut state = self.state.lock().await;
        let result = mutate(&mut state);
        if persist {
            self.persist(&state).await;
        }
        self.changes.send_replace(state.clone());
        result
    }

    async fn persist(&self, state: &Session) {
        let outcome = match state.snapshot() {
            Some(snapshot) => match serde_json::to_string(&snapshot) {
                Ok(json) => self.persisted.save(SNAPSHOT_KEY, &json).await,
                Err(e) => {
                    warn!(error = %e, "failed to serialize session snapshot");
                    return;
                }
            },
            None => self.persisted.remove(SNAPSHOT_KEY).await,
        };
        if let Err(e) = outcome {
            warn!(error = %e, "failed to persist session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persisted::MemoryStore;

    fn test_user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: Some("Grace".into()),
            last_name: None,
            avatar_url: None,
            profile_picture: None,
            provider: Some("google".into()),
            is_verified: Some(true),
            created_at: None,
        }
    }

    fn memory_store() -> (Arc<MemoryStore>, SessionStore) {
        let persisted = Arc::new(MemoryStore::new());
        let store = SessionStore::new(persisted.clone());
        (persisted, store)
    }

    async fn persisted_json(persisted: &MemoryStore) -> Option<serde_json::Value> {
        persisted
            .load(SNAPSHOT_KEY)
            .await
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[tokio::test]
    async fn starts_anonymous() {
        let (_, store) = memory_store();
        assert!(!store.is_authenticated().await);
        assert_eq!(store.phase().await, SessionPhase::Anonymous);
        assert!(store.needs_refresh().await, "no expiry counts as expired");
    }

    #[tokio::test]
    async fn clear_then_set_auth_yields_authenticated_session() {
        let (_, store) = memory_store();
        store.clear_auth().await;

        let before = now_millis();
        store.set_auth(test_user("u1"), "at_1", 1800).await;
        let after = now_millis();

        let session = store.snapshot().await;
        assert!(session.is_authenticated());
        assert_eq!(session.user, Some(test_user("u1")));
        assert_eq!(session.access_token.as_ref().unwrap().expose(), "at_1");
        let expires_at = session.expires_at.unwrap();
        assert!(expires_at >= before + 1_800_000 && expires_at <= after + 1_800_000);
        assert_eq!(store.phase().await, SessionPhase::Authenticated);
    }

    #[tokio::test]
    async fn set_auth_persists_snapshot_and_clear_removes_it() {
        let (persisted, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 1800).await;

        let json = persisted_json(&persisted).await.unwrap();
        assert_eq!(json["accessToken"], "at_1");
        assert_eq!(json["user"]["id"], "u1");
        assert!(json["tokenExpiresAt"].is_u64());

        store.clear_auth().await;
        assert!(persisted_json(&persisted).await.is_none());
        // Idempotent
        store.clear_auth().await;
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn clearing_resets_token_user_and_expiry_together() {
        let (_, store) = memory_store();
        let mut rx = store.subscribe();
        store.set_auth(test_user("u1"), "at_1", 1800).await;
        store.clear_auth().await;

        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert!(seen.access_token.is_none());
        assert!(seen.user.is_none());
        assert!(seen.expires_at.is_none());
    }

    #[tokio::test]
    async fn update_token_keeps_user() {
        let (persisted, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 1800).await;

        assert!(store.update_token("at_2", 60).await);
        let session = store.snapshot().await;
        assert_eq!(session.access_token.unwrap().expose(), "at_2");
        assert_eq!(session.user.unwrap().id, "u1");
        assert_eq!(persisted_json(&persisted).await.unwrap()["accessToken"], "at_2");
    }

    #[tokio::test]
    async fn update_token_without_user_is_rejected() {
        let (persisted, store) = memory_store();
        assert!(!store.update_token("at_orphan", 60).await);
        assert!(store.access_token().await.is_none());
        assert!(persisted_json(&persisted).await.is_none());
    }

    #[tokio::test]
    async fn update_user_merges_and_persists() {
        let (persisted, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 1800).await;

        let changed = store
            .update_user(UserPatch {
                last_name: Some("Hopper".into()),
                ..UserPatch::default()
            })
            .await;
        assert!(changed);
        let user = store.user().await.unwrap();
        assert_eq!(user.display_name(), "Grace Hopper");
        assert_eq!(
            persisted_json(&persisted).await.unwrap()["user"]["last_name"],
            "Hopper"
        );
    }

    #[tokio::test]
    async fn update_user_is_noop_when_anonymous() {
        let (_, store) = memory_store();
        let changed = store
            .update_user(UserPatch {
                email: Some("x@y.z".into()),
                ..UserPatch::default()
            })
            .await;
        assert!(!changed);
        assert!(store.user().await.is_none());
    }

    #[tokio::test]
    async fn apply_refresh_requires_user() {
        let (_, store) = memory_store();
        let grant = RefreshGrant {
            access_token: "at_new".into(),
            expires_in: 1800,
            user: Some(test_user("u9")),
        };
        assert!(!store.apply_refresh(&grant).await);
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn apply_refresh_merges_returned_user() {
        let (_, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 1800).await;
        store.set_loading(true).await;

        let mut fresh = test_user("u1");
        fresh.is_verified = Some(false);
        let grant = RefreshGrant {
            access_token: "at_2".into(),
            expires_in: 900,
            user: Some(fresh),
        };
        assert!(store.apply_refresh(&grant).await);

        let session = store.snapshot().await;
        assert!(!session.is_loading);
        assert_eq!(session.access_token.unwrap().expose(), "at_2");
        assert_eq!(session.user.unwrap().is_verified, Some(false));
    }

    #[tokio::test]
    async fn transient_flags_are_not_persisted() {
        let (persisted, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 1800).await;
        store.set_loading(true).await;
        store.set_error(Some("boom".into())).await;

        let json = persisted_json(&persisted).await.unwrap();
        assert!(json.get("isLoading").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(store.phase().await, SessionPhase::Refreshing);
    }

    #[tokio::test]
    async fn error_phase_settles_to_anonymous() {
        let (_, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 1800).await;
        store.clear_auth_with_error(SESSION_EXPIRED_MESSAGE).await;
        assert_eq!(store.phase().await, SessionPhase::Error);

        store.set_error(None).await;
        assert_eq!(store.phase().await, SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn short_lifetime_reads_as_expiring_soon() {
        let (_, store) = memory_store();
        store.set_auth(test_user("u1"), "at_1", 10).await;
        assert!(store.needs_refresh().await);
        assert_eq!(store.phase().await, SessionPhase::ExpiringSoon);
    }

    #[tokio::test]
    async fn custom_refresh_buffer_applies() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()))
            .with_refresh_buffer(Duration::from_secs(600));
        store.set_auth(test_user("u1"), "at_1", 300).await;
        assert!(store.needs_refresh().await);
    }

    #[tokio::test]
    async fn subscribers_see_committed_state() {
        let (_, store) = memory_store();
        let mut rx = store.subscribe();
        store.set_auth(test_user("u1"), "at_1", 1800).await;

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
    }
}
