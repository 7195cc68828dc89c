//! Credential store adapters
//!
//! Stored credentials are looked up by an exact string key. The OS keychain
//! backend keeps one entry per key under a single service name, with the
//! username and password serialized together as the entry's secret.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::request::CredentialPair;
use crate::error::{ConnectError, Result};

/// Read-only key/value lookup of stored credentials
pub trait CredentialStore: Send + Sync {
    /// Return the credential stored under exactly `key`, if any
    fn lookup(&self, key: &str) -> Result<Option<CredentialPair>>;
}

#[derive(Serialize, Deserialize)]
struct StoredSecret {
    username: String,
    password: String,
}

/// Credential store backed by the OS keychain (macOS Keychain, Windows
/// Credential Manager, Linux Secret Service)
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| ConnectError::CredentialStore(format!("invalid entry '{}': {}", key, e)))
    }

    /// Store a credential under `key`, replacing any existing entry
    pub fn store(&self, key: &str, credentials: &CredentialPair) -> Result<()> {
        let secret = serde_json::to_string(&StoredSecret {
            username: credentials.username().to_string(),
            password: credentials.password().to_string(),
        })
        .map_err(|e| ConnectError::CredentialStore(e.to_string()))?;

        self.entry(key)?
            .set_password(&secret)
            .map_err(|e| ConnectError::CredentialStore(format!("failed to store '{}': {}", key, e)))?;

        log::info!("Stored credentials under '{}'", key);
        Ok(())
    }

    /// Delete the credential stored under `key`. Returns false if none existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                log::info!("Removed stored credentials '{}'", key);
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(ConnectError::CredentialStore(format!(
                "failed to remove '{}': {}",
                key, e
            ))),
        }
    }
}

impl CredentialStore for KeyringStore {
    fn lookup(&self, key: &str) -> Result<Option<CredentialPair>> {
        let secret = match self.entry(key)?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(keyring::Error::NoStorageAccess(inner)) => {
                return Err(ConnectError::CredentialStore(format!(
                    "cannot access keychain storage: {}",
                    inner
                )));
            }
            Err(e) => return Err(ConnectError::CredentialStore(e.to_string())),
        };

        let stored: StoredSecret = serde_json::from_str(&secret).map_err(|e| {
            ConnectError::CredentialStore(format!("entry '{}' is not a stored credential: {}", key, e))
        })?;

        debug!("Keychain entry found for '{}'", key);
        Ok(Some(CredentialPair::new(stored.username, stored.password)))
    }
}

/// In-memory credential store, seeded up front
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, CredentialPair>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, credentials: CredentialPair) {
        self.entries.insert(key.into(), credentials);
    }

    pub fn with(mut self, key: impl Into<String>, credentials: CredentialPair) -> Self {
        self.insert(key, credentials);
        self
    }
}

impl CredentialStore for MemoryStore {
    fn lookup(&self, key: &str) -> Result<Option<CredentialPair>> {
        Ok(self.entries.get(key).cloned())
    }
}
