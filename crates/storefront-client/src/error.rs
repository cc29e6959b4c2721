//! Uniform error type for backend calls

/// Errors surfaced by `ApiClient` calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response was obtained (connect, TLS, timeout, body read).
    #[error("network failure: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The token could not be refreshed, or was rejected again after a
    /// refresh. The session has been cleared.
    #[error("session expired, please sign in again")]
    SessionExpired,

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request body: {0}")]
    Encode(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl Error {
    /// HTTP status for `Api` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::SessionExpired)
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
