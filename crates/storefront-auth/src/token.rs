//! Token refresh exchange
//!
//! The backend reissues access tokens from an HTTP-only refresh cookie, so
//! the exchange is a bodyless `POST` sent from a cookie-carrying client. The
//! same response shape is returned by the login endpoints.

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_EXPIRES_IN_SECS;
use crate::error::RefreshError;
use crate::session::User;

/// Token-issuing response from `/auth/refresh` and the login endpoints.
///
/// `expires_in` is a delta in seconds; absent means the default lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl TokenResponse {
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }
}

/// Outcome of a successful refresh, shared with every waiting caller.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub access_token: Secret<String>,
    pub expires_in: u64,
    pub user: Option<User>,
}

impl From<TokenResponse> for RefreshGrant {
    fn from(response: TokenResponse) -> Self {
        let expires_in = response.expires_in_secs();
        Self {
            access_token: Secret::new(response.access_token),
            expires_in,
            user: response.user,
        }
    }
}

/// `POST` to the refresh endpoint and decode the reissued token.
///
/// `client` must be built with a cookie store so the refresh cookie set at
/// login is sent along. No retries: failures are reported to the caller.
pub async fn exchange_refresh(
    client: &reqwest::Client,
    refresh_url: &str,
) -> Result<TokenResponse, RefreshError> {
    let response = client
        .post(refresh_url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .send()
        .await
        .map_err(|e| RefreshError::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))
}
