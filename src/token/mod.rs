//! Token store — single source of truth for the current access credential.
//!
//! Provides:
//! - In-memory cache over a pluggable persisted backend ([`TokenStorage`])
//! - Synchronous change notification via RAII [`Subscription`] guards
//! - Idempotent hydration from persisted storage at startup
//!
//! ## Design
//! - No global singleton: stores are constructed explicitly and injected
//!   into the HTTP client and the auth resolver, so tests can run several
//!   independent sessions side by side.
//! - Storage failures never escape `get`/`set`/`clear`; the store logs and
//!   degrades to "no token" so the UI stays available.
//! - The discipline is notify-after-write: the cache and the persisted
//!   value are updated before any listener runs.

pub mod storage;

pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage, ACCESS_TOKEN_KEY};

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

struct StoreInner {
    cached: RwLock<Option<String>>,
    hydrated: AtomicBool,
    storage: Box<dyn TokenStorage>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_listener_id: AtomicU64,
}

/// Shared holder of the current access credential.
///
/// Cheap to clone; clones share the same cache, backend, and listener
/// registry.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<StoreInner>,
}

impl TokenStore {
    /// Store over the given persisted backend. Call [`hydrate`] (or just
    /// [`get`]) before relying on the cached value.
    ///
    /// [`hydrate`]: TokenStore::hydrate
    /// [`get`]: TokenStore::get
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                cached: RwLock::new(None),
                hydrated: AtomicBool::new(false),
                storage: Box::new(storage),
                listeners: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// Store with no persistence beyond the process (tests, guest mode).
    pub fn in_memory() -> Self {
        Self::new(MemoryTokenStorage::new())
    }

    /// Load the persisted value into the cache. Idempotent: only the first
    /// call reads the backend.
    pub fn hydrate(&self) {
        if self.inner.hydrated.swap(true, Ordering::SeqCst) {
            return;
        }
        let loaded = match self.inner.storage.load() {
            Ok(value) => normalize(value),
            Err(err) => {
                tracing::warn!(error = %err, "token storage read failed; starting without a token");
                None
            }
        };
        *self.inner.cached.write() = loaded;
    }

    /// Current token, or `None` when logged out. Prefers the in-memory
    /// cache and falls back to a persisted read on first use. Never fails.
    pub fn get(&self) -> Option<String> {
        self.hydrate();
        self.inner.cached.read().clone()
    }

    /// Replace the current token and notify every subscriber synchronously.
    /// `None` and the empty string both mean "clear".
    pub fn set(&self, token: Option<String>) {
        let token = normalize(token);

        *self.inner.cached.write() = token.clone();
        self.inner.hydrated.store(true, Ordering::SeqCst);

        let persisted = match &token {
            Some(value) => self.inner.storage.save(value),
            None => self.inner.storage.clear(),
        };
        if let Err(err) = persisted {
            tracing::warn!(error = %err, "token storage write failed; keeping in-memory value only");
        }

        self.notify();
    }

    /// Equivalent to `set(None)`.
    pub fn clear(&self) {
        self.set(None);
    }

    /// Re-read persisted storage and adopt its value, notifying listeners
    /// when it differs from the cache. Used when another process (browser
    /// tab equivalent) rewrote the token file behind our back.
    pub fn reload(&self) {
        self.inner.hydrated.store(true, Ordering::SeqCst);
        let persisted = match self.inner.storage.load() {
            Ok(value) => normalize(value),
            Err(err) => {
                tracing::warn!(error = %err, "token storage re-read failed; treating as no token");
                None
            }
        };

        let changed = {
            let mut cached = self.inner.cached.write();
            if *cached == persisted {
                false
            } else {
                *cached = persisted;
                true
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Register a listener invoked (with no arguments) on every subsequent
    /// `set`/`clear`. Dropping the returned guard deregisters it.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().insert(id, Arc::new(listener));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    fn notify(&self) {
        // Snapshot outside the lock so a listener may subscribe/unsubscribe
        // without deadlocking.
        let snapshot: Vec<Listener> = self.inner.listeners.lock().values().cloned().collect();
        for listener in snapshot {
            listener();
        }
    }
}

/// Empty tokens are indistinguishable from absent ones.
fn normalize(token: Option<String>) -> Option<String> {
    token.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// RAII registration guard returned by [`TokenStore::subscribe`].
///
/// The listener is removed when this guard is dropped, so holding it for
/// exactly the lifetime of the interested component guarantees no leaked
/// callbacks.
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    /// Deregister explicitly. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.lock().remove(&self.id);
        }
    }
}
