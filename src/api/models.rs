use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use super::resilience::ResilienceSettings;
use crate::auth::StrategyKind;

/// Authenticated context produced by a strategy.
///
/// Holds what later requests need to authenticate, never the raw password.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// OAuth bearer token
    AccessToken {
        token: String,
        expires_at: Option<SystemTime>,
    },
    /// Claims-based session cookies (`FedAuth`, optionally `rtFa`)
    Cookies {
        fed_auth: String,
        rt_fa: Option<String>,
    },
    /// Pre-computed `Authorization` header for on-premises sites
    AuthorizationHeader(String),
    /// The ambient OS identity of the calling process
    CurrentUser,
}

impl AuthContext {
    pub fn bearer(token: impl Into<String>, expires_at: Option<SystemTime>) -> Self {
        AuthContext::AccessToken {
            token: token.into(),
            expires_at,
        }
    }

    /// Short description safe for display
    pub fn describe(&self) -> &'static str {
        match self {
            AuthContext::AccessToken { .. } => "bearer token",
            AuthContext::Cookies { .. } => "session cookies",
            AuthContext::AuthorizationHeader(_) => "authorization header",
            AuthContext::CurrentUser => "current user",
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthContext::AccessToken { expires_at, .. } => f
                .debug_struct("AccessToken")
                .field("expires_at", expires_at)
                .finish_non_exhaustive(),
            AuthContext::Cookies { rt_fa, .. } => f
                .debug_struct("Cookies")
                .field("rt_fa", &rt_fa.is_some())
                .finish_non_exhaustive(),
            AuthContext::AuthorizationHeader(_) => f.write_str("AuthorizationHeader(..)"),
            AuthContext::CurrentUser => f.write_str("CurrentUser"),
        }
    }
}

/// Kind of site the connection points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    OnPremises,
    Online,
    TenantAdmin,
}

const ONLINE_DOMAINS: &[&str] = &[
    ".sharepoint.com",
    ".sharepoint.cn",
    ".sharepoint.de",
    ".sharepoint-mil.us",
];

impl ConnectionType {
    /// Classify a site url. Tenant admin detection is skipped when
    /// `skip_admin_check` is set.
    pub fn detect(url: &Url, skip_admin_check: bool) -> Self {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        let Some(domain) = ONLINE_DOMAINS.iter().find(|d| host.ends_with(*d)) else {
            return ConnectionType::OnPremises;
        };

        let tenant = &host[..host.len() - domain.len()];
        if !skip_admin_check && tenant.ends_with("-admin") && !tenant.contains('.') {
            ConnectionType::TenantAdmin
        } else {
            ConnectionType::Online
        }
    }

    pub fn is_online(&self) -> bool {
        !matches!(self, ConnectionType::OnPremises)
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::OnPremises => f.write_str("on-premises"),
            ConnectionType::Online => f.write_str("online"),
            ConnectionType::TenantAdmin => f.write_str("tenant admin"),
        }
    }
}

/// An authenticated connection to a site
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub url: Url,
    pub strategy: StrategyKind,
    pub context: AuthContext,
    pub connection_type: ConnectionType,
    pub resilience: ResilienceSettings,
    pub skip_admin_check: bool,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        url: Url,
        strategy: StrategyKind,
        context: AuthContext,
        resilience: ResilienceSettings,
        skip_admin_check: bool,
    ) -> Self {
        let connection_type = ConnectionType::detect(&url, skip_admin_check);
        Self {
            id: Uuid::new_v4(),
            url,
            strategy,
            context,
            connection_type,
            resilience,
            skip_admin_check,
            connected_at: Utc::now(),
        }
    }
}
