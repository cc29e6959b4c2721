//! Login, logout and selection endpoints
//!
//! Login endpoints return the same token shape as the refresh exchange; a
//! successful login establishes the session through `SessionStore::set_auth`.

use serde::Serialize;
use serde_json::{Value, json};
use storefront_auth::{TokenResponse, User};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::pipeline::{ApiClient, Method};

impl ApiClient {
    /// Ask the backend to send a magic link to `email`.
    pub async fn initiate_email_auth(&self, email: &str) -> Result<Value> {
        self.post("/auth/email/initiate", &json!({ "email": email }))
            .await
    }

    /// Exchange a magic-link token for a session.
    pub async fn verify_email(&self, token: &str) -> Result<User> {
        let response: TokenResponse = self
            .post("/auth/email/verify", &json!({ "token": token }))
            .await?;
        self.establish(response, "email").await
    }

    /// Exchange a Google authorization code for a session.
    pub async fn google_auth(&self, auth_code: &str) -> Result<User> {
        let response: TokenResponse = self
            .post("/auth/google", &json!({ "auth_code": auth_code }))
            .await?;
        self.establish(response, "google").await
    }

    /// Exchange a Facebook authorization code for a session.
    pub async fn facebook_auth(&self, auth_code: &str, redirect_uri: &str) -> Result<User> {
        let body = json!({ "auth_code": auth_code, "redirect_uri": redirect_uri });
        let response: TokenResponse = self.post("/auth/facebook", &body).await?;
        self.establish(response, "facebook").await
    }

    /// End the session on the backend, then locally.
    ///
    /// The local session is cleared even when the backend call fails.
    pub async fn logout(&self) {
        if let Err(e) = self
            .call_raw(Method::POST, "/auth/logout", Some(json!({})))
            .await
        {
            warn!(error = %e, "logout request failed, clearing session anyway");
        }
        self.session().clear_auth().await;
        info!("logged out");
    }

    /// Record the user's product configuration.
    pub async fn submit_product_selection(
        &self,
        product: &impl Serialize,
        user_selection: &impl Serialize,
    ) -> Result<Value> {
        let product =
            serde_json::to_value(product).map_err(|e| Error::Encode(e.to_string()))?;
        let user_selection =
            serde_json::to_value(user_selection).map_err(|e| Error::Encode(e.to_string()))?;
        self.post(
            "/product/select",
            &json!({ "product": product, "user_selection": user_selection }),
        )
        .await
    }

    async fn establish(&self, response: TokenResponse, provider: &str) -> Result<User> {
        let expires_in = response.expires_in_secs();
        let user = response
            .user
            .ok_or_else(|| Error::Decode(format!("{provider} login response has no user")))?;
        self.session()
            .set_auth(user.clone(), response.access_token, expires_in)
            .await;
        info!(provider, user_id = %user.id, "login succeeded");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use storefront_auth::{MemoryStore, SessionStore};
    use tokio::net::TcpListener;

    use super::*;

    fn login_body(token: &str) -> Value {
        json!({
            "access_token": token,
            "expires_in": 900,
            "user": {"id": "u9", "email": "u9@example.com", "provider": "google"}
        })
    }

    async fn start_backend(logout_calls: Arc<AtomicUsize>, logout_status: StatusCode) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let app = axum::Router::new()
            .route(
                "/api/v1/auth/email/initiate",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "sent_to": body["email"] }))
                }),
            )
            .route(
                "/api/v1/auth/email/verify",
                post(|Json(body): Json<Value>| async move {
                    if body["token"] == "good" {
                        (StatusCode::OK, Json(login_body("at_email")))
                    } else {
                        (StatusCode::BAD_REQUEST, Json(json!({"detail": "Invalid token"})))
                    }
                }),
            )
            .route(
                "/api/v1/auth/google",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["auth_code"], "code123");
                    Json(login_body("at_google"))
                }),
            )
            .route(
                "/api/v1/auth/facebook",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["redirect_uri"], "https://shop.test/cb");
                    Json(json!({"access_token": "at_fb"}))
                }),
            )
            .route(
                "/api/v1/auth/logout",
                post(move || {
                    let calls = logout_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        (logout_status, Json(json!({"ok": true})))
                    }
                }),
            )
            .route(
                "/api/v1/product/select",
                post(|Json(body): Json<Value>| async move { Json(body) }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        url
    }

    async fn client(url: &str) -> ApiClient {
        let store = Arc::new(SessionStore::new(Arc::new(MemoryStore::new())));
        ApiClient::new(url, store, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn google_login_establishes_session() {
        let url = start_backend(Arc::default(), StatusCode::OK).await;
        let client = client(&url).await;

        let user = client.google_auth("code123").await.unwrap();
        assert_eq!(user.id, "u9");
        assert!(client.session().is_authenticated().await);
        assert_eq!(
            client.session().access_token().await.unwrap().expose(),
            "at_google"
        );
        assert!(!client.session().needs_refresh().await);
    }

    #[tokio::test]
    async fn email_verification_establishes_session() {
        let url = start_backend(Arc::default(), StatusCode::OK).await;
        let client = client(&url).await;

        let sent: Value = client.initiate_email_auth("a@b.c").await.unwrap();
        assert_eq!(sent["sent_to"], "a@b.c");

        let err = client.verify_email("bad").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");
        assert!(!client.session().is_authenticated().await);

        client.verify_email("good").await.unwrap();
        assert_eq!(
            client.session().access_token().await.unwrap().expose(),
            "at_email"
        );
    }

    #[tokio::test]
    async fn login_without_user_is_rejected() {
        let url = start_backend(Arc::default(), StatusCode::OK).await;
        let client = client(&url).await;

        let err = client
            .facebook_auth("code", "https://shop.test/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(!client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn logout_clears_session_even_on_backend_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let url = start_backend(calls.clone(), StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = client(&url).await;
        client.google_auth("code123").await.unwrap();

        client.logout().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!client.session().is_authenticated().await);
        assert!(client.session().snapshot().await.error.is_none());
    }

    #[tokio::test]
    async fn logout_when_backend_unreachable_still_clears() {
        let client = client("http://127.0.0.1:1").await;
        client
            .session()
            .set_auth(
                serde_json::from_value(json!({"id": "u1", "email": "e"})).unwrap(),
                "at",
                900,
            )
            .await;

        client.logout().await;
        assert!(!client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn product_selection_is_wrapped() {
        let url = start_backend(Arc::default(), StatusCode::OK).await;
        let client = client(&url).await;

        let echoed = client
            .submit_product_selection(&json!({"id": 71}), &json!({"size": "L"}))
            .await
            .unwrap();
        assert_eq!(echoed["product"]["id"], 71);
        assert_eq!(echoed["user_selection"]["size"], "L");
    }
}
