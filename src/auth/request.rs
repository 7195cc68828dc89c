//! Connection request and credential types

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::api::resilience::ResilienceSettings;
use crate::error::{ConnectError, Result};

/// Username and secret used for a single connect attempt
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    username: String,
    password: String,
}

impl CredentialPair {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a caller supplied for one connect invocation.
///
/// This is the flat shape produced by the command line. Exactly one
/// strategy group may be populated; [`crate::auth::AuthStrategy::select`]
/// turns it into a strategy and rejects anything ambiguous.
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub url: Url,
    pub credentials: Option<CredentialPair>,
    pub current_identity: bool,
    pub use_adfs: bool,
    pub use_web_login: bool,
    pub skip_admin_check: bool,

    // Azure AD
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub clear_token_cache: bool,
    pub tenant: Option<String>,
    pub certificate_path: Option<PathBuf>,
    pub certificate_password: Option<String>,

    // App-only token
    pub realm: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,

    pub resilience: ResilienceSettings,
}

impl ConnectionRequest {
    /// Create a request for `url` with no strategy parameters set.
    ///
    /// The url must be absolute http(s).
    pub fn new(url: &str) -> Result<Self> {
        let url = parse_site_url(url)?;
        Ok(Self {
            url,
            credentials: None,
            current_identity: false,
            use_adfs: false,
            use_web_login: false,
            skip_admin_check: false,
            client_id: None,
            redirect_uri: None,
            clear_token_cache: false,
            tenant: None,
            certificate_path: None,
            certificate_password: None,
            realm: None,
            app_id: None,
            app_secret: None,
            resilience: ResilienceSettings::default(),
        })
    }

    pub fn with_credentials(mut self, credentials: CredentialPair) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_resilience(mut self, resilience: ResilienceSettings) -> Self {
        self.resilience = resilience;
        self
    }
}

fn parse_site_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConnectError::configuration(format!("'{}' is not an absolute URL: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConnectError::configuration(format!(
                "Unsupported URL scheme '{}' in '{}'",
                other, raw
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(ConnectError::configuration(format!("URL '{}' has no host", raw)));
    }

    Ok(url)
}
