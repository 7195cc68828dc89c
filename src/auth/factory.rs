//! Connection construction, one builder per strategy
//!
//! Every builder takes the shared [`ConnectionTarget`] (site url plus the
//! resilience settings and admin-check flag that ride along unchanged) and
//! returns an authenticated [`Connection`].

use std::path::Path;

use log::{debug, info};
use url::Url;

use super::certificate::ClientCertificate;
use super::client::{AuthProvider, native_authorize_url, site_origin};
use super::prompt::InteractiveHost;
use super::request::{ConnectionRequest, CredentialPair};
use super::resolver::CredentialResolver;
use super::store::CredentialStore;
use super::strategy::{AuthStrategy, DefaultIdentity, StrategyKind};
use super::token_cache::TokenCache;
use crate::api::models::{AuthContext, Connection, ConnectionType};
use crate::api::resilience::ResilienceSettings;
use crate::error::{ConnectError, Result};

/// Parameters shared by every strategy
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    pub url: Url,
    pub resilience: ResilienceSettings,
    pub skip_admin_check: bool,
}

impl ConnectionTarget {
    pub fn from_request(request: &ConnectionRequest) -> Self {
        Self {
            url: request.url.clone(),
            resilience: request.resilience.clone(),
            skip_admin_check: request.skip_admin_check,
        }
    }

    fn connect(&self, strategy: StrategyKind, context: AuthContext) -> Connection {
        Connection::new(
            self.url.clone(),
            strategy,
            context,
            self.resilience.clone(),
            self.skip_admin_check,
        )
    }
}

/// Pull the authorization code out of whatever the user pasted back: a bare
/// code or the full redirect url.
pub fn extract_authorization_code(answer: &str) -> Result<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ConnectError::cancelled("sign-in was cancelled"));
    }

    let redirect = match Url::parse(answer) {
        Ok(redirect) if answer.contains("://") => redirect,
        _ => return Ok(answer.to_string()),
    };

    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in redirect.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (Some(code), _) if !code.is_empty() => Ok(code),
        (_, Some(error)) if error == "access_denied" => {
            Err(ConnectError::cancelled("sign-in was declined"))
        }
        (_, Some(error)) => Err(ConnectError::authentication(format!(
            "sign-in failed: {}",
            description.unwrap_or(error)
        ))),
        _ => Err(ConnectError::authentication(
            "redirect url carries no authorization code",
        )),
    }
}

pub struct ConnectionFactory<'a> {
    store: &'a dyn CredentialStore,
    host: &'a dyn InteractiveHost,
    provider: &'a dyn AuthProvider,
    token_cache: &'a TokenCache,
}

impl<'a> ConnectionFactory<'a> {
    pub fn new(
        store: &'a dyn CredentialStore,
        host: &'a dyn InteractiveHost,
        provider: &'a dyn AuthProvider,
        token_cache: &'a TokenCache,
    ) -> Self {
        Self {
            store,
            host,
            provider,
            token_cache,
        }
    }

    /// Build a connection for an already selected strategy
    pub async fn build(&self, target: &ConnectionTarget, strategy: AuthStrategy) -> Result<Connection> {
        match strategy {
            AuthStrategy::Token {
                realm,
                app_id,
                app_secret,
            } => self.token(target, realm, &app_id, &app_secret).await,
            AuthStrategy::WebLogin => self.web_login(target),
            AuthStrategy::Adfs { credentials } => self.adfs(target, credentials).await,
            AuthStrategy::NativeAad {
                client_id,
                redirect_uri,
                clear_token_cache,
            } => {
                self.native_aad(target, &client_id, &redirect_uri, clear_token_cache)
                    .await
            }
            AuthStrategy::AppOnlyAad {
                client_id,
                tenant,
                certificate_path,
                certificate_password,
            } => {
                self.app_only_aad(
                    target,
                    &client_id,
                    &tenant,
                    &certificate_path,
                    &certificate_password,
                )
                .await
            }
            AuthStrategy::Default(identity) => self.default_credentials(target, identity).await,
        }
    }

    /// App-only token via realm, app id and secret
    pub async fn token(
        &self,
        target: &ConnectionTarget,
        realm: Option<String>,
        app_id: &str,
        app_secret: &str,
    ) -> Result<Connection> {
        let realm = match realm {
            Some(realm) => realm,
            None => {
                let realm = self.provider.discover_realm(&target.url).await?;
                info!("Discovered realm {} for {}", realm, target.url);
                realm
            }
        };

        let context = self
            .provider
            .app_only_token(&target.url, &realm, app_id, app_secret)
            .await?;
        Ok(target.connect(StrategyKind::Token, context))
    }

    /// Interactive browser sign-in. Blocks until the user finishes or cancels.
    pub fn web_login(&self, target: &ConnectionTarget) -> Result<Connection> {
        let login_url = format!(
            "{}/_layouts/15/Authenticate.aspx?Source={}",
            site_origin(&target.url),
            urlencoding::encode(target.url.as_str())
        );

        let cookie = self.host.open_browser_login(&login_url)?;
        if cookie.trim().is_empty() {
            return Err(ConnectError::cancelled("browser login was cancelled"));
        }

        let context = AuthContext::Cookies {
            fed_auth: cookie.trim().to_string(),
            rt_fa: None,
        };
        Ok(target.connect(StrategyKind::WebLogin, context))
    }

    pub async fn adfs(
        &self,
        target: &ConnectionTarget,
        credentials: Option<CredentialPair>,
    ) -> Result<Connection> {
        let credentials = self.obtain_credentials(&target.url, credentials)?;
        let context = self.provider.adfs_login(&target.url, &credentials).await?;
        Ok(target.connect(StrategyKind::Adfs, context))
    }

    /// Native application flow: cached token first, then browser sign-in
    pub async fn native_aad(
        &self,
        target: &ConnectionTarget,
        client_id: &str,
        redirect_uri: &str,
        clear_token_cache: bool,
    ) -> Result<Connection> {
        if clear_token_cache {
            self.token_cache.clear()?;
        }

        if let Some(context) = self.provider.cached_native_token(&target.url, client_id).await? {
            debug!("Signed in to {} with a cached token", target.url);
            return Ok(target.connect(StrategyKind::NativeAad, context));
        }

        let authorize_url = native_authorize_url(client_id, redirect_uri, &site_origin(&target.url));
        let answer = self.host.open_browser_login(&authorize_url)?;
        let code = extract_authorization_code(&answer)?;

        let context = self
            .provider
            .redeem_authorization_code(&target.url, client_id, redirect_uri, &code)
            .await?;
        Ok(target.connect(StrategyKind::NativeAad, context))
    }

    /// Non-interactive certificate sign-in against a specific tenant
    pub async fn app_only_aad(
        &self,
        target: &ConnectionTarget,
        client_id: &str,
        tenant: &str,
        certificate_path: &Path,
        certificate_password: &str,
    ) -> Result<Connection> {
        let certificate = ClientCertificate::load(certificate_path, certificate_password)?;
        let context = self
            .provider
            .certificate_token(&target.url, tenant, client_id, &certificate)
            .await?;
        Ok(target.connect(StrategyKind::AppOnlyAad, context))
    }

    pub async fn default_credentials(
        &self,
        target: &ConnectionTarget,
        identity: DefaultIdentity,
    ) -> Result<Connection> {
        let credentials = match identity {
            DefaultIdentity::CurrentUser => {
                return Ok(target.connect(StrategyKind::Default, AuthContext::CurrentUser));
            }
            DefaultIdentity::Explicit(credentials) => credentials,
            DefaultIdentity::Stored => self.obtain_credentials(&target.url, None)?,
        };

        let online = ConnectionType::detect(&target.url, true).is_online();
        let context = self
            .provider
            .user_credentials(&target.url, online, &credentials)
            .await?;
        Ok(target.connect(StrategyKind::Default, context))
    }

    /// Supplied credentials, else the credential store, else a prompt
    fn obtain_credentials(&self, url: &Url, supplied: Option<CredentialPair>) -> Result<CredentialPair> {
        if let Some(credentials) = supplied {
            return Ok(credentials);
        }

        if let Some(credentials) = CredentialResolver::new(self.store).resolve(url)? {
            return Ok(credentials);
        }

        info!("No stored credentials for {}, prompting", url);
        match self
            .host
            .prompt_for_credential(url.as_str(), &format!("Enter your credentials for {}", url))
        {
            Err(ConnectError::NoCredentials { .. }) => Err(ConnectError::no_credentials(url.as_str())),
            other => other,
        }
    }
}
