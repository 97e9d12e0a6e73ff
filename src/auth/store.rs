//! File-backed session persistence.
//!
//! Holds the token and the serialized current user so a restart picks the
//! session back up without asking the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Session;
use crate::api::types::User;
use crate::errors::SessionError;

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    user: User,
    saved_at: DateTime<Utc>,
}

/// Persistent session store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the location named by the config.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.session.resolved_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nobody is logged in.
    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error(e)),
        };
        let stored: StoredSession =
            serde_json::from_str(&json).map_err(|e| SessionError::Corrupted(e.to_string()))?;
        debug!(
            "Loaded session for {} (saved {})",
            stored.user.email, stored.saved_at
        );
        Ok(Some(Session {
            token: stored.token,
            user: stored.user,
        }))
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }
        let stored = StoredSession {
            token: session.token.clone(),
            user: session.user.clone(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| SessionError::Corrupted(e.to_string()))?;
        write_private(&self.path, json.as_bytes()).map_err(|e| self.storage_error(e))?;
        Ok(())
    }

    /// Remove the session file. Clearing an empty store is fine.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.storage_error(e)),
        }
    }

    fn storage_error(&self, e: std::io::Error) -> SessionError {
        SessionError::Storage {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

/// Write a file only the owner can read. The mode is set before any byte of
/// the token lands on disk.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
