//! Session configuration.
//!
//! Everything the coordinator needs to talk to the Pongdang backend:
//! base URL, persisted-storage location, refresh-cookie name, and the
//! request timeout. Loadable from `PONGDANG_*` environment variables or
//! constructed explicitly (tests always construct).

use std::path::PathBuf;
use std::time::Duration;

/// Name of the HttpOnly session cookie minted by the backend. Opaque to
/// this layer; only the refresh endpoint consumes it.
pub const DEFAULT_COOKIE_NAME: &str = "pongdang_token";

/// Default HTTP request timeout (seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one session coordinator.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend origin, e.g. `https://api.pongdang.app`. Stored without a
    /// trailing slash.
    pub base_url: String,
    /// Directory holding the persisted `access_token` file.
    pub storage_dir: PathBuf,
    /// Refresh-cookie name, for diagnostics only.
    pub cookie_name: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SessionConfig {
    /// Explicit configuration with defaults for cookie name and timeout.
    pub fn new(base_url: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            storage_dir: storage_dir.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from environment variables.
    ///
    /// `PONGDANG_API_URL` is required; `PONGDANG_STORAGE_DIR` and
    /// `PONGDANG_COOKIE_NAME` are optional. Returns `None` when the URL is
    /// missing or empty, or when no storage directory can be determined.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PONGDANG_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }

        let storage_dir = std::env::var("PONGDANG_STORAGE_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(Self::default_storage_dir)?;

        let mut config = Self::new(base_url, storage_dir);
        if let Ok(name) = std::env::var("PONGDANG_COOKIE_NAME") {
            if !name.trim().is_empty() {
                config.cookie_name = name;
            }
        }
        Some(config)
    }

    /// Platform-appropriate per-user data directory for this app.
    pub fn default_storage_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "pongdang", "pongdang")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }
}
