//! Authentication data model and route guard.
//!
//! Provides:
//! - [`User`]: identity snapshot owned by the backend, refreshed on demand
//! - [`Role`]: backend-assigned role, `admin` implies every other role
//! - [`AuthState`]: tri-state session view (`Loading` / `Authenticated` /
//!   `Unauthenticated`), exactly one variant at a time
//! - [`check_access`]: the guard decision used by protected views
//!
//! ## Design
//! - `AuthState` is never persisted; the resolver recomputes it on start,
//!   on credential change, and on revalidation triggers.
//! - Missing a required role is a hard [`SessionError::PermissionDenied`],
//!   not a silent hide: the embedding UI catches it at a boundary and
//!   renders an access-denied view.

pub mod resolver;

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Backend-assigned role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Identity profile returned by `GET /api/user/me`. Immutable snapshot;
/// the backend owns the truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub role: Role,
    /// Spendable balance in the points/donation store.
    #[serde(default)]
    pub point: i64,
    /// Whether the signup profile has been completed.
    #[serde(default)]
    pub profile_complete: bool,
}

impl User {
    /// Role check with admin override: an admin satisfies every
    /// requirement, a plain user only `Role::User`.
    pub fn has_role(&self, required: Role) -> bool {
        self.role == Role::Admin || self.role == required
    }
}

/// Client-side view of session validity. Exactly one variant holds at any
/// time; `Authenticated` is only ever reached through a successful
/// identity fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Resolution in progress; render nothing conclusive yet.
    Loading,
    Authenticated(User),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// What a protected view should do for the current [`AuthState`].
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Still resolving; show the neutral "checking session" indicator.
    Wait,
    /// Not logged in; redirect away rather than showing an error.
    Redirect,
    /// Unlocked; render with this identity.
    Allow(User),
}

/// Guard for views that require authentication, optionally with a role.
///
/// An authenticated user lacking the required role is a loud
/// [`SessionError::PermissionDenied`] — distinct from "unauthenticated" —
/// so the boundary can render an access-denied view instead of silently
/// hiding content.
pub fn check_access(
    state: &AuthState,
    required: Option<Role>,
) -> Result<GuardDecision, SessionError> {
    match state {
        AuthState::Loading => Ok(GuardDecision::Wait),
        AuthState::Unauthenticated => Ok(GuardDecision::Redirect),
        AuthState::Authenticated(user) => match required {
            Some(role) if !user.has_role(role) => {
                Err(SessionError::PermissionDenied { required: role })
            }
            _ => Ok(GuardDecision::Allow(user.clone())),
        },
    }
}
