//! Auth state resolver — owns the identity-fetch lifecycle and broadcasts
//! [`AuthState`] to the whole application.
//!
//! ## Responsibilities
//! - Hydrate the token store on startup, then resolve the initial state
//!   (no token → `Unauthenticated` with zero network calls)
//! - React to revalidation triggers: token-store notification, persisted
//!   storage changes observed by the synchronizer, window focus, and
//!   explicit `refetch` calls
//! - Keep at most one identity fetch in flight; a new trigger supersedes
//!   the current fetch and its late result is discarded, so a stale
//!   response can never clobber a newer one
//! - Best-effort logout: remote invalidation failures are logged, local
//!   state is cleared unconditionally
//!
//! ## Design
//! The resolver runs as a spawned task draining an unbounded trigger
//! channel; state flows out over a `tokio::sync::watch` channel, giving
//! every consumer a cheap clone-and-borrow view plus async change
//! notification. The task exits once every [`AuthHandle`] is gone.

use crate::auth::AuthState;
use crate::error::SessionError;
use crate::http::ApiClient;
use crate::token::{Subscription, TokenStore};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Why a revalidation was requested. Diagnostic only; every reason takes
/// the same path through the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    /// The token store notified a `set`/`clear`.
    TokenChanged,
    /// Persisted storage changed underneath us (another tab/process).
    StorageChanged,
    /// The window regained focus after being backgrounded.
    FocusRegained,
    /// Explicit `refetch()` call.
    Requested,
}

/// Spawns and wires the resolver task.
pub struct AuthResolver;

impl AuthResolver {
    /// Start resolving against the given client and store. The returned
    /// handle is the application's view of the session; clone it freely.
    pub fn spawn(api: Arc<ApiClient>, tokens: TokenStore) -> AuthHandle {
        tokens.hydrate();

        let (state_tx, state_rx) = watch::channel(AuthState::Loading);
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        // Token writes (login, refresh, clear) drive revalidation.
        let subscription = tokens.subscribe({
            let tx = trigger_tx.clone();
            move || {
                let _ = tx.send(Revalidate::TokenChanged);
            }
        });

        tokio::spawn(run_loop(api.clone(), tokens.clone(), state_tx, trigger_rx));

        AuthHandle {
            state_rx,
            triggers: trigger_tx,
            api,
            tokens,
            _token_subscription: Arc::new(subscription),
        }
    }
}

/// Cloneable handle to the running resolver.
#[derive(Clone)]
pub struct AuthHandle {
    state_rx: watch::Receiver<AuthState>,
    triggers: mpsc::UnboundedSender<Revalidate>,
    api: Arc<ApiClient>,
    tokens: TokenStore,
    /// Keeps the token-store listener registered for as long as any
    /// handle lives.
    _token_subscription: Arc<Subscription>,
}

impl AuthHandle {
    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.state_rx.borrow().clone()
    }

    /// Receiver for observing every state transition.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state_rx.clone()
    }

    /// Request a fresh identity resolution. Supersedes any in-flight
    /// fetch; only the newest fetch's result is ever applied.
    pub fn refetch(&self) {
        self.revalidate(Revalidate::Requested);
    }

    /// Trigger a revalidation with an explicit reason.
    pub fn revalidate(&self, reason: Revalidate) {
        let _ = self.triggers.send(reason);
    }

    /// End the session: best-effort remote invalidation, unconditional
    /// local clear. Resolves once the broadcast state reads
    /// `Unauthenticated`.
    pub async fn logout(&self) {
        if let Err(err) = self.api.logout().await {
            tracing::warn!(error = %err, "remote logout failed; clearing local session anyway");
        }

        self.tokens.clear();

        // The clear above triggers a token-less resolution, which settles
        // without touching the network.
        let mut rx = self.state_rx.clone();
        let _ = rx
            .wait_for(|state| matches!(state, AuthState::Unauthenticated))
            .await;
    }
}

async fn run_loop(
    api: Arc<ApiClient>,
    tokens: TokenStore,
    state_tx: watch::Sender<AuthState>,
    mut triggers: mpsc::UnboundedReceiver<Revalidate>,
) {
    loop {
        let fetch = resolve_once(&api, &tokens);
        tokio::pin!(fetch);

        let superseded = tokio::select! {
            resolved = &mut fetch => {
                state_tx.send_replace(resolved);
                false
            }
            trigger = triggers.recv() => match trigger {
                Some(reason) => {
                    tracing::debug!(?reason, "revalidation supersedes in-flight identity fetch");
                    true
                }
                None => return,
            }
        };
        if superseded {
            continue;
        }

        // Idle until the next trigger.
        match triggers.recv().await {
            Some(reason) => tracing::debug!(?reason, "revalidating session"),
            None => return,
        }
    }
}

/// One full resolution pass. Failures of any class resolve to
/// `Unauthenticated`; the causes are only distinguished in the logs.
async fn resolve_once(api: &ApiClient, tokens: &TokenStore) -> AuthState {
    if tokens.get().is_none() {
        tracing::debug!("no access token; resolving unauthenticated without a network call");
        return AuthState::Unauthenticated;
    }

    match api.fetch_me().await {
        Ok(user) => AuthState::Authenticated(user),
        Err(err @ SessionError::Unauthorized) => {
            tracing::debug!(error = %err, "identity fetch rejected; session is over");
            AuthState::Unauthenticated
        }
        Err(err) => {
            tracing::warn!(error = %err, "identity fetch failed; treating session as unauthenticated");
            AuthState::Unauthenticated
        }
    }
}
