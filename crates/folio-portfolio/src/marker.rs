//! Pending-login markers for deferred handshakes.
//!
//! A marker records the remote session id from a login URL so that a later
//! invocation, possibly in another process, can reconnect to the session the
//! human is logging into. One file per session key:
//! `<dir>/folio-session-<key>.tmp`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{PortfolioError, Result};

/// File-backed store of pending remote sessions.
#[derive(Debug, Clone)]
pub struct SessionMarkerStore {
    dir: PathBuf,
}

impl SessionMarkerStore {
    /// Store markers in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store markers in the OS temp dir.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// The directory holding markers.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Marker path for a session key.
    pub fn path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("folio-session-{safe}.tmp"))
    }

    /// The remote session recorded for `key`, if any.
    pub async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let session = contents.trim();
                Ok((!session.is_empty()).then(|| session.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PortfolioError::Marker { path, source }),
        }
    }

    /// Record `remote_session` for `key`, replacing any earlier marker.
    pub async fn write(&self, key: &str, remote_session: &str) -> Result<()> {
        let path = self.path(key);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PortfolioError::Marker {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, remote_session)
            .await
            .map_err(|source| PortfolioError::Marker {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(session = %key, path = %path.display(), "session marker written");
        Ok(())
    }

    /// Delete the marker for `key`. Returns whether one existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(session = %key, "session marker removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PortfolioError::Marker { path, source }),
        }
    }
}
