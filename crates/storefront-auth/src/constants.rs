//! Session defaults
//!
//! Lifetimes and intervals used when the backend or configuration does not
//! say otherwise.

use std::time::Duration;

/// Token lifetime assumed when a login or refresh response omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 1800;

/// How long before expiry a token counts as needing refresh
pub const REFRESH_BUFFER: Duration = Duration::from_secs(30);

/// Interval of the opportunistic background refresh check
pub const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Persisted-store key holding the session snapshot
pub const SNAPSHOT_KEY: &str = "auth_state";

/// Refresh endpoint, relative to the backend API base
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Error flag recorded when a refresh fails and the session is dropped
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired";
