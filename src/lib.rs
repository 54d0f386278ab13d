//! Client session & token coordinator for the Pongdang (퐁당퐁당) backend.
//!
//! The backend owns all business logic and issues short-lived bearer
//! tokens plus an HttpOnly refresh cookie. This crate is the client-side
//! session core any shell (webview host, CLI, desktop app) embeds:
//!
//! - [`TokenStore`]: single source of truth for the access credential,
//!   cached in memory, persisted under the `access_token` key, with
//!   synchronous change notification
//! - [`ApiClient`]: HTTP client whose interceptor chain attaches the
//!   bearer token and transparently recovers from one 401 per call via
//!   silent refresh and a single replay
//! - [`AuthResolver`]: broadcasts the tri-state [`AuthState`] and keeps at
//!   most one identity fetch in flight, discarding superseded results
//! - [`SessionSynchronizer`]: folds cross-tab storage changes and window
//!   focus back into revalidation
//!
//! Data flow: UI action → [`ApiClient`] → bearer attached → backend 401 →
//! silent refresh → [`TokenStore`] updated → subscribers notified →
//! original request replayed.
//!
//! ## Example
//! ```no_run
//! use pongdang_session::{
//!     ApiClient, AuthResolver, FileTokenStorage, SessionConfig, SessionSynchronizer,
//!     TokenStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = SessionConfig::new(
//!     "https://api.pongdang.app",
//!     SessionConfig::default_storage_dir().expect("no home dir"),
//! );
//! let tokens = TokenStore::new(FileTokenStorage::new(&config.storage_dir));
//! let api = Arc::new(ApiClient::new(&config, tokens.clone())?);
//! let session = AuthResolver::spawn(api.clone(), tokens.clone());
//! let sync = SessionSynchronizer::new(session.clone(), tokens);
//!
//! // Shell wiring: feed platform events, observe state.
//! sync.focus_regained();
//! let _state = session.watch();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod sync;
pub mod token;

pub use auth::resolver::{AuthHandle, AuthResolver, Revalidate};
pub use auth::{check_access, AuthState, GuardDecision, Role, User};
pub use config::SessionConfig;
pub use error::SessionError;
pub use http::{ApiClient, Auth};
pub use sync::SessionSynchronizer;
pub use token::{
    FileTokenStorage, MemoryTokenStorage, Subscription, TokenStorage, TokenStore,
    ACCESS_TOKEN_KEY,
};
