//! Error taxonomy for connection establishment
//!
//! Every failure aborts the current connect attempt. The registry keeps
//! whatever connection it held before.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConnectError>;

/// Errors raised while selecting a strategy, resolving credentials or
/// authenticating against the remote site.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Ambiguous or incomplete strategy parameters
    #[error("Invalid connection parameters: {0}")]
    Configuration(String),

    /// No explicit, stored or prompted credentials were available
    #[error("No credentials available for {url}")]
    NoCredentials { url: String },

    /// The remote side rejected the credentials, token or certificate
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The client certificate could not be loaded or unlocked
    #[error("Failed to load certificate '{path}': {reason}")]
    Certificate { path: PathBuf, reason: String },

    /// The user aborted an interactive login or prompt
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The OS credential store itself failed (not a missing entry)
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// The token cache file could not be removed or written
    #[error("Token cache error at '{path}': {source}")]
    TokenCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConnectError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn no_credentials(url: impl Into<String>) -> Self {
        Self::NoCredentials { url: url.into() }
    }

    /// Authentication failure without an underlying error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Authentication failure carrying the underlying cause
    pub fn authentication_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Authentication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn certificate(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Certificate {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Cancellation is reported to the user but is not a process failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<reqwest::Error> for ConnectError {
    fn from(error: reqwest::Error) -> Self {
        let message = match error.status() {
            Some(status) => format!("request to remote endpoint failed with status {}", status),
            None => "request to remote endpoint failed".to_string(),
        };
        Self::authentication_with(message, error)
    }
}
