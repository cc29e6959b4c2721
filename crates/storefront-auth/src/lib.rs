//! Client-side session management for the storefront
//!
//! Owns the signed-in user's identity, access token and expiry, persists a
//! snapshot of it across restarts, and refreshes the token through the
//! backend's cookie-authenticated refresh endpoint.
//!
//! Session flow:
//! 1. `SessionStore::initialize()` restores the persisted snapshot at startup
//! 2. Login handlers call `SessionStore::set_auth()` with the issued token
//! 3. Callers that hit a 401 go through `RefreshCoordinator::refresh()`,
//!    which collapses concurrent refreshes into one exchange
//! 4. The refreshed token is written back via `SessionStore::apply_refresh()`
//! 5. Logout or an unrecoverable refresh failure calls `clear_auth()`

pub mod constants;
pub mod coordinator;
pub mod error;
pub mod persisted;
pub mod session;
pub mod store;
pub mod token;

pub use constants::*;
pub use coordinator::RefreshCoordinator;
pub use error::{Error, RefreshError, Result};
pub use persisted::{FileStore, MemoryStore, PersistedStore};
pub use session::{Session, SessionPhase, User, UserPatch, needs_refresh_at, now_millis};
pub use store::SessionStore;
pub use token::{RefreshGrant, TokenResponse, exchange_refresh};
