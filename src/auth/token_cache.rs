//! Persisted Azure AD token cache
//!
//! One JSON file per user holding refresh tokens keyed by client id and
//! resource. The connect flow only ever clears it; the HTTP provider reads
//! and writes entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedToken {
    pub refresh_token: String,
    pub expires_on: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    tokens: HashMap<String, CachedToken>,
}

#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_key(client_id: &str, resource: &str) -> String {
        format!("{}|{}", client_id, resource)
    }

    /// Delete the cache file. A missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            log::debug!("Token cache {:?} does not exist, nothing to clear", self.path);
            return Ok(());
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Cleared token cache {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConnectError::TokenCache {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ConnectError {
        ConnectError::TokenCache {
            path: self.path.clone(),
            source,
        }
    }

    /// A missing file reads as empty and unparseable content is dropped with
    /// a warning. Any other I/O failure is returned.
    fn read(&self) -> Result<CacheFile> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheFile::default()),
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable token cache {:?}: {}", self.path, e);
            CacheFile::default()
        }))
    }

    /// Cached refresh token for this client and resource, if any
    pub fn get(&self, client_id: &str, resource: &str) -> Option<CachedToken> {
        match self.read() {
            Ok(file) => file.tokens.get(&Self::entry_key(client_id, resource)).cloned(),
            Err(e) => {
                log::warn!("Cannot read token cache: {}", e);
                None
            }
        }
    }

    pub fn put(&self, client_id: &str, resource: &str, token: CachedToken) -> Result<()> {
        let mut file = self.read()?;
        file.tokens.insert(Self::entry_key(client_id, resource), token);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        std::fs::write(&self.path, content).map_err(|e| self.io_error(e))?;

        log::debug!("Saved refresh token for client {} to {:?}", client_id, self.path);
        Ok(())
    }
}
