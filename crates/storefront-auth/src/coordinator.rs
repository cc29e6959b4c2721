//! Single-flight token refresh
//!
//! Any number of tasks may ask for a refresh at once (typically every request
//! that just got a 401). The first caller starts the exchange and parks a
//! shared handle to it in the in-flight slot; later callers clone that handle
//! and await the same outcome. The slot is emptied by the exchange itself
//! before it resolves, so the next refresh after completion starts fresh.

use std::sync::Arc;

use common::Secret;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RefreshError;
use crate::store::SessionStore;
use crate::token::{RefreshGrant, exchange_refresh};

type InFlight = Shared<BoxFuture<'static, Result<RefreshGrant, RefreshError>>>;

/// Performs refresh exchanges and collapses concurrent requests into one.
///
/// Cheap to clone; clones share the in-flight slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<SessionStore>,
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    /// `http` must keep cookies (the refresh credential is a cookie).
    pub fn new(http: reqwest::Client, refresh_url: String, store: Arc<SessionStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url,
                store,
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    /// Refresh the access token, or join the refresh already running.
    ///
    /// On success the new token has been written to the session store before
    /// this returns. On failure nothing is retried and the session is left
    /// as it was (minus the loading flag); clearing it is the caller's call.
    pub async fn refresh(&self) -> Result<RefreshGrant, RefreshError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            self.join_or_start(&mut slot)
        };
        flight.await
    }

    /// Token to use after `rejected` got a 401.
    ///
    /// Joins the running exchange if there is one. Otherwise, if the session
    /// already holds a different token, an exchange finished after `rejected`
    /// was sent and that token is returned without another refresh. Only when
    /// the session still holds `rejected` is a new exchange started.
    pub async fn refresh_unless_rotated(
        &self,
        rejected: &Secret<String>,
    ) -> Result<Secret<String>, RefreshError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            if slot.is_none() {
                // An exchange writes the session before it empties the slot,
                // so with the slot held this read cannot miss a finished one.
                match self.inner.store.access_token().await {
                    Some(current) if current != *rejected => {
                        debug!("token rotated since it was rejected, skipping refresh");
                        return Ok(current);
                    }
                    _ => {}
                }
            }
            self.join_or_start(&mut slot)
        };
        flight.await.map(|grant| grant.access_token)
    }

    fn join_or_start(&self, slot: &mut Option<InFlight>) -> InFlight {
        match slot.as_ref() {
            Some(flight) => {
                debug!("joining in-flight token refresh");
                flight.clone()
            }
            None => {
                let flight = run_exchange(self.inner.clone()).boxed().shared();
                *slot = Some(flight.clone());
                flight
            }
        }
    }

    /// Whether a refresh exchange is currently outstanding.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().await.is_some()
    }
}

async fn run_exchange(inner: Arc<Inner>) -> Result<RefreshGrant, RefreshError> {
    inner.store.set_loading(true).await;
    debug!(url = %inner.refresh_url, "starting token refresh");

    let result = match exchange_refresh(&inner.http, &inner.refresh_url).await {
        Ok(response) => {
            let grant = RefreshGrant::from(response);
            if inner.store.apply_refresh(&grant).await {
                Ok(grant)
            } else {
                Err(RefreshError::NoSession)
            }
        }
        Err(e) => Err(e),
    };

    match &result {
        Ok(grant) => {
            metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
            info!(expires_in = grant.expires_in, "token refresh succeeded");
        }
        Err(e) => {
            metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);
            warn!(error = %e, "token refresh failed");
            inner.store.set_loading(false).await;
        }
    }

    inner.in_flight.lock().await.take();
    result
}
