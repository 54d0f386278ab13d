//! Error taxonomy for session and API calls.
//!
//! Recovery policy:
//! - Expired credentials are recovered locally (silent refresh + one
//!   replay) before an [`Unauthorized`] ever reaches a caller.
//! - Permission failures are distinct from "not logged in" so the UI can
//!   show an access-denied view instead of redirecting to login.
//! - Storage failures are not represented here at all: the token store
//!   logs them and degrades to "no token".
//!
//! [`Unauthorized`]: SessionError::Unauthorized

use crate::auth::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Credential missing, expired, or still rejected after the one-shot
    /// refresh-and-replay.
    #[error("not authorized")]
    Unauthorized,

    /// Authenticated, but the identity lacks the required role.
    #[error("permission denied: {required:?} role required")]
    PermissionDenied { required: Role },

    /// Non-auth HTTP failure, passed through to the caller untouched.
    #[error("request failed ({status}): {body}")]
    Http { status: u16, body: String },

    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl SessionError {
    /// True for the final authorization failure a caller may want to treat
    /// as "session over".
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
