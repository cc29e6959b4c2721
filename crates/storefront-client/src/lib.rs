//! Authenticated request pipeline for the storefront backend
//!
//! Every outbound call goes through `ApiClient::call`, which attaches the
//! session's bearer token, and on a 401 refreshes the token (single-flight)
//! and retries exactly once. Failures come back as one uniform `Error`.
//!
//! Call lifecycle:
//! 1. Read the current access token from the `SessionStore`
//! 2. Send with the token and the cookie jar (refresh cookie rides along)
//! 3. 401 with a token attached → `RefreshCoordinator::refresh()` → retry once
//! 4. Refresh failure or a second 401 → session cleared, `SessionExpired`
//! 5. Other non-2xx → `Error::Api` with the backend's message
//!
//! A background task (`spawn_refresh_task`) refreshes tokens that are about
//! to expire so most calls never see the 401 path.

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod refresh;

pub use error::{Error, Result};
pub use pipeline::{ApiClient, ApiResponse, Method, extract_error_message};
pub use refresh::{CycleOutcome, spawn_refresh_task};
