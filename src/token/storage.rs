//! Persisted credential storage backends.
//!
//! The browser build of the product keeps the access token under the
//! localStorage key `access_token`. Native shells get the same contract
//! through [`TokenStorage`]: a single opaque string under a well-known
//! key, plus an in-memory backend for tests and ephemeral sessions.
//!
//! ## Design
//! - Backends are synchronous: the value is one short string on local disk.
//! - All failures are surfaced as `anyhow::Error` to the [`TokenStore`],
//!   which degrades to "no token" instead of propagating them.
//! - File writes go through a temp file + rename so a crash mid-write
//!   never leaves a truncated credential behind.
//!
//! [`TokenStore`]: crate::token::TokenStore

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Storage key for the access credential, shared with the browser build.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Pluggable persisted storage for the access credential.
pub trait TokenStorage: Send + Sync {
    /// Read the persisted token, `None` when absent.
    fn load(&self) -> Result<Option<String>>;

    /// Persist the given token, replacing any previous value.
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the persisted token. Removing an absent token is not an error.
    fn clear(&self) -> Result<()>;
}

/// File-backed storage: one file named [`ACCESS_TOKEN_KEY`] under a
/// per-user directory.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Storage rooted at `dir`; the token lives in `dir/access_token`.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(ACCESS_TOKEN_KEY),
        }
    }

    /// Full path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).context(format!("read token file {}", self.path.display())),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context(format!("create storage dir {}", parent.display()))?;
        }

        // Temp file + rename keeps the token file atomic on crash.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, token).context(format!("write token file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .context(format!("commit token file {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context(format!("remove token file {}", self.path.display())),
        }
    }
}

/// In-memory storage for tests and sessions that should not outlive the
/// process.
#[derive(Default)]
pub struct MemoryTokenStorage {
    value: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded storage, for exercising hydration paths.
    pub fn with_token(token: &str) -> Self {
        Self {
            value: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.value.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.value.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(tmp.path());

        assert!(storage.load().unwrap().is_none());

        storage.save("tok_123").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("tok_123"));

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_clear_absent_is_ok() {
        let tmp = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(tmp.path());
        storage.clear().unwrap();
    }

    #[test]
    fn test_file_storage_creates_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(&tmp.path().join("nested/session"));
        storage.save("tok_456").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("tok_456"));
    }

    #[test]
    fn test_file_storage_blank_file_reads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(tmp.path());
        fs::write(storage.path(), "  \n").unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryTokenStorage::new();
        assert!(storage.load().unwrap().is_none());
        storage.save("tok").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("tok"));
        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
    }
}
