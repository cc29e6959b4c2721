//! Authenticated call path
//!
//! One `ApiClient` is shared by every caller. It owns a cookie-carrying
//! `reqwest::Client`, so the HTTP-only refresh cookie set at login is replayed
//! on the refresh exchange, and a `RefreshCoordinator` so concurrent 401s
//! collapse into one exchange.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use storefront_auth::{REFRESH_PATH, RefreshCoordinator, SESSION_EXPIRED_MESSAGE, SessionStore};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

pub use reqwest::Method;

/// Path prefix of the versioned backend API.
const API_PREFIX: &str = "/api/v1";

/// Decoded success body.
///
/// JSON when the response declares `application/json`, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
}

impl ApiResponse {
    /// Decode into `T`. Text bodies decode as a JSON string.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            ApiResponse::Json(value) => value,
            ApiResponse::Text(text) => Value::String(text),
        };
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Shared handle to the backend API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Build a client for the backend at `backend_url` (`/api/v1` is appended).
    pub fn new(backend_url: &str, session: Arc<SessionStore>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Setup(format!("building HTTP client: {e}")))?;
        Ok(Self::with_http_client(http, backend_url, session))
    }

    /// Build around an existing HTTP client. The refresh exchange uses the
    /// same client, so it must keep cookies for refresh to work.
    pub fn with_http_client(
        http: reqwest::Client,
        backend_url: &str,
        session: Arc<SessionStore>,
    ) -> Self {
        let base_url = format!("{}{API_PREFIX}", backend_url.trim_end_matches('/'));
        let coordinator = RefreshCoordinator::new(
            http.clone(),
            format!("{base_url}{REFRESH_PATH}"),
            session.clone(),
        );
        Self {
            http,
            base_url,
            session,
            coordinator,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Absolute URLs pass through; anything else is joined onto the API base.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        }
    }

    /// Perform a call and decode the body into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T> {
        self.call_raw(method, endpoint, body).await?.decode()
    }

    /// Perform a call with bearer auth, refreshing and retrying once on 401.
    pub async fn call_raw(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let url = self.url_for(endpoint);
        self.execute(method, url, body, request_id).await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.call(Method::GET, endpoint, None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        self.call(Method::POST, endpoint, Some(to_body(body)?)).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        self.call(Method::PUT, endpoint, Some(to_body(body)?)).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        self.call(Method::PATCH, endpoint, Some(to_body(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.call(Method::DELETE, endpoint, None).await
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %method, url = %url))]
    async fn execute(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
        request_id: String,
    ) -> Result<ApiResponse> {
        let sent = self.session.access_token().await;
        let response = self.send(&method, &url, body.as_ref(), sent.as_ref()).await?;

        let sent = match sent {
            Some(token) if response.status() == StatusCode::UNAUTHORIZED => token,
            _ => return finish(response).await,
        };
        record_status(response.status());

        let token = self.token_for_retry(&sent).await?;
        let retry = self.send(&method, &url, body.as_ref(), Some(&token)).await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            record_status(retry.status());
            warn!("request rejected again after refresh, clearing session");
            self.session
                .clear_auth_with_error(SESSION_EXPIRED_MESSAGE)
                .await;
            return Err(Error::SessionExpired);
        }
        finish(retry).await
    }

    /// Token to retry with after `sent` was rejected.
    ///
    /// Either a token another caller already refreshed in, or the result of
    /// a started or joined refresh.
    async fn token_for_retry(&self, sent: &Secret<String>) -> Result<Secret<String>> {
        debug!("access token rejected, refreshing");
        match self.coordinator.refresh_unless_rotated(sent).await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing session");
                self.session
                    .clear_auth_with_error(SESSION_EXPIRED_MESSAGE)
                    .await;
                Err(Error::SessionExpired)
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&Secret<String>>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token.expose());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            warn!(error = %e, "request failed before a response arrived");
            Error::Network(e.to_string())
        })
    }
}

fn to_body(body: &impl Serialize) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| Error::Encode(e.to_string()))
}

fn record_status(status: StatusCode) {
    metrics::counter!("api_requests_total", "status" => status.as_u16().to_string())
        .increment(1);
}

/// Turn a final response into a body or an `Error::Api`.
async fn finish(response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    record_status(status);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(status, &body);
        debug!(status = status.as_u16(), message = %message, "backend returned an error");
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("reading response body: {e}")))?;

    if !is_json {
        return Ok(ApiResponse::Text(text));
    }
    if text.trim().is_empty() {
        return Ok(ApiResponse::Json(Value::Null));
    }
    serde_json::from_str(&text)
        .map(ApiResponse::Json)
        .map_err(|e| Error::Decode(e.to_string()))
}

/// Human-readable message for a failed call.
///
/// Prefers the body's `message`, then `detail`, then `HTTP <code>: <reason>`.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail"] {
            match fields.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::String(_)) | Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}
