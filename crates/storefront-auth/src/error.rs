//! Error types for session operations

/// Errors from persistence and snapshot handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("invalid store key: {0}")]
    InvalidKey(String),
}

/// Why a token refresh did not produce a usable session.
///
/// Cloneable so a single outcome can be handed to every caller waiting on
/// the same in-flight refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Http(String),

    #[error("refresh rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("no signed-in user to attach the refreshed token to")]
    NoSession,
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
