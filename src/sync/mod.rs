//! Cross-tab / focus synchronizer.
//!
//! Keeps this process's cached identity consistent with credential
//! changes that originate elsewhere: another tab (process) rewriting the
//! persisted token, or a token that expired while the window was
//! backgrounded.
//!
//! ## Design
//! The embedding shell owns the platform event sources (storage watcher,
//! window focus). It feeds raw events into [`SessionSynchronizer`], which
//! filters storage changes down to the access-token key, re-syncs the
//! in-memory cache with persisted storage, and asks the resolver to
//! revalidate. Dropping the synchronizer (and the resolver handles it
//! holds) detaches every listener; the token-store side is guarded by the
//! RAII [`Subscription`](crate::token::Subscription) held in the handle.

use crate::auth::resolver::{AuthHandle, Revalidate};
use crate::token::{TokenStore, ACCESS_TOKEN_KEY};

/// Bridges platform storage/focus events into session revalidation.
pub struct SessionSynchronizer {
    handle: AuthHandle,
    tokens: TokenStore,
    storage_key: String,
}

impl SessionSynchronizer {
    pub fn new(handle: AuthHandle, tokens: TokenStore) -> Self {
        Self {
            handle,
            tokens,
            storage_key: ACCESS_TOKEN_KEY.to_string(),
        }
    }

    /// Storage-change intake. Events for keys other than the access
    /// token's are ignored; a relevant change re-hydrates the cache from
    /// persisted storage and revalidates the identity.
    pub fn storage_changed(&self, key: &str) {
        if key != self.storage_key {
            tracing::trace!(key, "ignoring storage change for unrelated key");
            return;
        }

        self.tokens.reload();
        self.handle.revalidate(Revalidate::StorageChanged);
    }

    /// Focus-regained intake. Covers tokens that expired or were refreshed
    /// while the tab was backgrounded.
    pub fn focus_regained(&self) {
        self.handle.revalidate(Revalidate::FocusRegained);
    }
}
