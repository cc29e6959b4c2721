//! Opportunistic background token refresh
//!
//! Periodically checks the session and refreshes a token that is inside its
//! refresh buffer, so most calls never pay for a 401 round trip. The task
//! goes through the same `RefreshCoordinator` as the call path, so it never
//! races a request-driven refresh.

use std::sync::Arc;
use std::time::Duration;

use storefront_auth::{RefreshCoordinator, SessionStore};
use tracing::{debug, info, warn};

/// What one check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No session to refresh.
    Anonymous,
    /// Token still outside the refresh buffer.
    Fresh,
    Refreshed,
    /// Refresh failed; the session was left for the call path to handle.
    Failed,
}

/// Spawn a task that runs a refresh check every `interval`.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_refresh_task(
    store: Arc<SessionStore>,
    coordinator: RefreshCoordinator,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; initialize() has just run
        ticker.tick().await;

        loop {
            ticker.tick().await;
            refresh_cycle(&store, &coordinator).await;
        }
    })
}

async fn refresh_cycle(store: &SessionStore, coordinator: &RefreshCoordinator) -> CycleOutcome {
    if !store.is_authenticated().await {
        return CycleOutcome::Anonymous;
    }
    if !store.needs_refresh().await {
        return CycleOutcome::Fresh;
    }

    debug!("access token inside refresh buffer, refreshing");
    match coordinator.refresh().await {
        Ok(grant) => {
            info!(expires_in = grant.expires_in, "background token refresh succeeded");
            CycleOutcome::Refreshed
        }
        Err(e) => {
            warn!(error = %e, "background refresh failed, will retry next cycle");
            CycleOutcome::Failed
        }
    }
}
