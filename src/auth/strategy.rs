//! Authentication strategy selection
//!
//! A [`ConnectionRequest`] is flat: any combination of flags can be set.
//! [`AuthStrategy::select`] maps it onto exactly one strategy, each variant
//! carrying only the fields it needs. Groups are checked in precedence
//! order: token, web login, ADFS, native AAD, app-only AAD, default.

use std::fmt;
use std::path::PathBuf;

use super::request::{ConnectionRequest, CredentialPair};
use crate::error::{ConnectError, Result};

/// Identity used by the default strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultIdentity {
    /// The caller's ambient OS identity, no lookup
    CurrentUser,
    /// Credentials supplied by the caller
    Explicit(CredentialPair),
    /// Resolve from the credential store, then prompt
    Stored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Token {
        realm: Option<String>,
        app_id: String,
        app_secret: String,
    },
    WebLogin,
    Adfs {
        credentials: Option<CredentialPair>,
    },
    NativeAad {
        client_id: String,
        redirect_uri: String,
        clear_token_cache: bool,
    },
    AppOnlyAad {
        client_id: String,
        tenant: String,
        certificate_path: PathBuf,
        certificate_password: String,
    },
    Default(DefaultIdentity),
}

/// Strategy discriminant, kept on the connection for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Token,
    WebLogin,
    Adfs,
    NativeAad,
    AppOnlyAad,
    Default,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Token => "app-only token",
            StrategyKind::WebLogin => "web login",
            StrategyKind::Adfs => "ADFS",
            StrategyKind::NativeAad => "Azure AD native application",
            StrategyKind::AppOnlyAad => "Azure AD app-only certificate",
            StrategyKind::Default => "default credentials",
        };
        f.write_str(name)
    }
}

/// Parameters of one group that were actually supplied
struct GroupMarks {
    kind: StrategyKind,
    flags: Vec<&'static str>,
}

fn marked_groups(request: &ConnectionRequest) -> Vec<GroupMarks> {
    let mut groups = Vec::new();
    let mut mark = |kind: StrategyKind, candidates: &[(&'static str, bool)]| {
        let flags: Vec<&'static str> = candidates
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect();
        if !flags.is_empty() {
            groups.push(GroupMarks { kind, flags });
        }
    };

    mark(
        StrategyKind::Token,
        &[
            ("--realm", request.realm.is_some()),
            ("--app-id", request.app_id.is_some()),
            ("--app-secret", request.app_secret.is_some()),
        ],
    );
    mark(StrategyKind::WebLogin, &[("--use-web-login", request.use_web_login)]);
    mark(StrategyKind::Adfs, &[("--use-adfs", request.use_adfs)]);
    mark(
        StrategyKind::NativeAad,
        &[
            ("--redirect-uri", request.redirect_uri.is_some()),
            ("--clear-token-cache", request.clear_token_cache),
        ],
    );
    mark(
        StrategyKind::AppOnlyAad,
        &[
            ("--tenant", request.tenant.is_some()),
            ("--certificate-path", request.certificate_path.is_some()),
            ("--certificate-password", request.certificate_password.is_some()),
        ],
    );
    mark(StrategyKind::Default, &[("--current-credentials", request.current_identity)]);

    groups
}

fn require<T: Clone>(value: &Option<T>, flag: &str, strategy: StrategyKind) -> Result<T> {
    value.clone().ok_or_else(|| {
        ConnectError::configuration(format!("{} requires {}", strategy, flag))
    })
}

impl AuthStrategy {
    /// Select the single strategy described by `request`.
    ///
    /// Fails with [`ConnectError::Configuration`] when flags from more than
    /// one group are present, or when the chosen group is incomplete.
    pub fn select(request: &ConnectionRequest) -> Result<Self> {
        let groups = marked_groups(request);

        if groups.len() > 1 {
            let conflicting: Vec<String> = groups
                .iter()
                .map(|g| format!("{} ({})", g.flags.join(", "), g.kind))
                .collect();
            return Err(ConnectError::configuration(format!(
                "parameters from more than one authentication method were supplied: {}",
                conflicting.join(" vs ")
            )));
        }

        let kind = match groups.first() {
            Some(group) => group.kind,
            // A lone client id is incomplete for both Azure AD methods
            None if request.client_id.is_some() => {
                return Err(ConnectError::configuration(
                    "--client-id needs either --redirect-uri (native application) or \
                     --tenant, --certificate-path and --certificate-password (app-only)",
                ));
            }
            None => StrategyKind::Default,
        };

        if request.client_id.is_some()
            && !matches!(kind, StrategyKind::NativeAad | StrategyKind::AppOnlyAad)
        {
            return Err(ConnectError::configuration(format!(
                "--client-id cannot be combined with {}",
                kind
            )));
        }

        if request.credentials.is_some()
            && !matches!(kind, StrategyKind::Adfs | StrategyKind::Default)
        {
            return Err(ConnectError::configuration(format!(
                "explicit credentials cannot be combined with {}",
                kind
            )));
        }

        let strategy = match kind {
            StrategyKind::Token => AuthStrategy::Token {
                realm: request.realm.clone(),
                app_id: require(&request.app_id, "--app-id", kind)?,
                app_secret: require(&request.app_secret, "--app-secret", kind)?,
            },
            StrategyKind::WebLogin => AuthStrategy::WebLogin,
            StrategyKind::Adfs => AuthStrategy::Adfs {
                credentials: request.credentials.clone(),
            },
            StrategyKind::NativeAad => AuthStrategy::NativeAad {
                client_id: require(&request.client_id, "--client-id", kind)?,
                redirect_uri: require(&request.redirect_uri, "--redirect-uri", kind)?,
                clear_token_cache: request.clear_token_cache,
            },
            StrategyKind::AppOnlyAad => AuthStrategy::AppOnlyAad {
                client_id: require(&request.client_id, "--client-id", kind)?,
                tenant: require(&request.tenant, "--tenant", kind)?,
                certificate_path: require(&request.certificate_path, "--certificate-path", kind)?,
                certificate_password: require(
                    &request.certificate_password,
                    "--certificate-password",
                    kind,
                )?,
            },
            StrategyKind::Default => {
                let identity = match (&request.credentials, request.current_identity) {
                    (Some(_), true) => {
                        return Err(ConnectError::configuration(
                            "--current-credentials cannot be combined with explicit credentials",
                        ));
                    }
                    (Some(credentials), false) => DefaultIdentity::Explicit(credentials.clone()),
                    (None, true) => DefaultIdentity::CurrentUser,
                    (None, false) => DefaultIdentity::Stored,
                };
                AuthStrategy::Default(identity)
            }
        };

        Ok(strategy)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            AuthStrategy::Token { .. } => StrategyKind::Token,
            AuthStrategy::WebLogin => StrategyKind::WebLogin,
            AuthStrategy::Adfs { .. } => StrategyKind::Adfs,
            AuthStrategy::NativeAad { .. } => StrategyKind::NativeAad,
            AuthStrategy::AppOnlyAad { .. } => StrategyKind::AppOnlyAad,
            AuthStrategy::Default(_) => StrategyKind::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConnectionRequest {
        ConnectionRequest::new("https://contoso.sharepoint.com/sites/team").unwrap()
    }

    fn config_message(result: Result<AuthStrategy>) -> String {
        match result {
            Err(ConnectError::Configuration(message)) => message,
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_request_is_default_stored() {
        let strategy = AuthStrategy::select(&request()).unwrap();
        assert_eq!(strategy, AuthStrategy::Default(DefaultIdentity::Stored));
    }

    #[test]
    fn test_current_identity() {
        let mut req = request();
        req.current_identity = true;

        assert_eq!(
            AuthStrategy::select(&req).unwrap(),
            AuthStrategy::Default(DefaultIdentity::CurrentUser)
        );
    }

    #[test]
    fn test_explicit_credentials() {
        let req = request().with_credentials(CredentialPair::new("alice", "pw"));

        assert_eq!(
            AuthStrategy::select(&req).unwrap(),
            AuthStrategy::Default(DefaultIdentity::Explicit(CredentialPair::new("alice", "pw")))
        );
    }

    #[test]
    fn test_token_without_realm() {
        let mut req = request();
        req.app_id = Some("app".into());
        req.app_secret = Some("secret".into());

        assert_eq!(
            AuthStrategy::select(&req).unwrap(),
            AuthStrategy::Token {
                realm: None,
                app_id: "app".into(),
                app_secret: "secret".into(),
            }
        );
    }

    #[test]
    fn test_token_missing_secret() {
        let mut req = request();
        req.app_id = Some("app".into());

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--app-secret"));
    }

    #[test]
    fn test_adfs_keeps_explicit_credentials() {
        let mut req = request().with_credentials(CredentialPair::new("bob", "pw"));
        req.use_adfs = true;

        let strategy = AuthStrategy::select(&req).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Adfs);
        assert!(matches!(strategy, AuthStrategy::Adfs { credentials: Some(_) }));
    }

    #[test]
    fn test_native_aad() {
        let mut req = request();
        req.client_id = Some("client".into());
        req.redirect_uri = Some("https://localhost/callback".into());
        req.clear_token_cache = true;

        assert_eq!(
            AuthStrategy::select(&req).unwrap(),
            AuthStrategy::NativeAad {
                client_id: "client".into(),
                redirect_uri: "https://localhost/callback".into(),
                clear_token_cache: true,
            }
        );
    }

    #[test]
    fn test_app_only_aad_requires_all_fields() {
        let mut req = request();
        req.client_id = Some("client".into());
        req.tenant = Some("contoso.onmicrosoft.com".into());
        req.certificate_path = Some(PathBuf::from("/tmp/app.pfx"));

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--certificate-password"));

        req.certificate_password = Some("pw".into());
        assert_eq!(AuthStrategy::select(&req).unwrap().kind(), StrategyKind::AppOnlyAad);
    }

    #[test]
    fn test_lone_client_id_rejected() {
        let mut req = request();
        req.client_id = Some("client".into());

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--client-id"));
    }

    #[test]
    fn test_two_groups_conflict_names_flags() {
        let mut req = request();
        req.use_web_login = true;
        req.use_adfs = true;

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--use-web-login"));
        assert!(message.contains("--use-adfs"));
        // precedence order in the message
        assert!(message.find("--use-web-login") < message.find("--use-adfs"));
    }

    #[test]
    fn test_token_and_native_conflict() {
        let mut req = request();
        req.app_id = Some("app".into());
        req.app_secret = Some("secret".into());
        req.client_id = Some("client".into());
        req.redirect_uri = Some("https://localhost".into());

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--app-id"));
        assert!(message.contains("--redirect-uri"));
    }

    #[test]
    fn test_native_and_app_only_conflict() {
        let mut req = request();
        req.client_id = Some("client".into());
        req.redirect_uri = Some("https://localhost".into());
        req.tenant = Some("contoso".into());

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--redirect-uri"));
        assert!(message.contains("--tenant"));
    }

    #[test]
    fn test_credentials_with_web_login_rejected() {
        let mut req = request().with_credentials(CredentialPair::new("alice", "pw"));
        req.use_web_login = true;

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("explicit credentials"));
    }

    #[test]
    fn test_current_identity_with_credentials_rejected() {
        let mut req = request().with_credentials(CredentialPair::new("alice", "pw"));
        req.current_identity = true;

        assert!(matches!(
            AuthStrategy::select(&req),
            Err(ConnectError::Configuration(_))
        ));
    }

    #[test]
    fn test_current_identity_with_adfs_conflict() {
        let mut req = request();
        req.current_identity = true;
        req.use_adfs = true;

        let message = config_message(AuthStrategy::select(&req));
        assert!(message.contains("--current-credentials"));
    }

    #[test]
    fn test_skip_admin_check_is_shared() {
        let mut req = request();
        req.use_web_login = true;
        req.skip_admin_check = true;

        assert_eq!(AuthStrategy::select(&req).unwrap(), AuthStrategy::WebLogin);
    }
}
