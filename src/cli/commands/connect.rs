//! `spconnect connect`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use sharepoint_connect::api::{Connection, ConnectionManager};
use sharepoint_connect::auth::{
    AuthProvider, ConnectionRequest, HttpAuthProvider, InteractiveHost, KeyringStore,
    NonInteractiveHost, TerminalHost, TokenCache,
};
use sharepoint_connect::config::Config;

use super::password_or_prompt;

#[derive(Args, Debug)]
pub struct ConnectCommands {
    /// Site url to connect to
    #[arg(short, long)]
    pub url: String,

    /// Username for default or ADFS sign-in
    #[arg(long)]
    pub username: Option<String>,
    /// Password (prompted when omitted)
    #[arg(long, requires = "username")]
    pub password: Option<String>,
    /// Sign in as the current OS user
    #[arg(long)]
    pub current_credentials: bool,
    /// Sign in through ADFS
    #[arg(long)]
    pub use_adfs: bool,
    /// Sign in interactively in a browser
    #[arg(long)]
    pub use_web_login: bool,
    /// Do not check whether the url is a tenant admin site
    #[arg(long)]
    pub skip_tenant_admin_check: bool,

    /// Azure AD application (client) id
    #[arg(long)]
    pub client_id: Option<String>,
    /// Redirect uri of the Azure AD native application
    #[arg(long)]
    pub redirect_uri: Option<String>,
    /// Delete the cached Azure AD tokens before signing in
    #[arg(long)]
    pub clear_token_cache: bool,
    /// Azure AD tenant, e.g. contoso.onmicrosoft.com
    #[arg(long)]
    pub tenant: Option<String>,
    /// PKCS#12 certificate for app-only Azure AD sign-in
    #[arg(long)]
    pub certificate_path: Option<PathBuf>,
    /// Password of the certificate file
    #[arg(long)]
    pub certificate_password: Option<String>,

    /// ACS realm, discovered from the site when omitted
    #[arg(long)]
    pub realm: Option<String>,
    /// App id registered for app-only access
    #[arg(long)]
    pub app_id: Option<String>,
    /// App secret registered for app-only access
    #[arg(long)]
    pub app_secret: Option<String>,

    /// Minimal server health score, -1 disables the check
    #[arg(long, allow_hyphen_values = true)]
    pub minimal_health_score: Option<i32>,
    /// Number of retries for throttled requests
    #[arg(long)]
    pub retry_count: Option<u32>,
    /// Seconds to wait between retries
    #[arg(long)]
    pub retry_wait: Option<u64>,
    /// Request timeout in milliseconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Never prompt; fail when credentials are missing
    #[arg(long)]
    pub non_interactive: bool,
}

impl ConnectCommands {
    fn to_request(&self, config: &Config) -> Result<ConnectionRequest> {
        let mut request = ConnectionRequest::new(&self.url)?;

        if let Some(username) = &self.username {
            request.credentials = Some(password_or_prompt(username, self.password.clone())?);
        }
        request.current_identity = self.current_credentials;
        request.use_adfs = self.use_adfs;
        request.use_web_login = self.use_web_login;
        request.skip_admin_check = self.skip_tenant_admin_check;

        request.client_id = self.client_id.clone();
        request.redirect_uri = self.redirect_uri.clone();
        request.clear_token_cache = self.clear_token_cache;
        request.tenant = self.tenant.clone();
        request.certificate_path = self.certificate_path.clone();
        request.certificate_password = self.certificate_password.clone();

        request.realm = self.realm.clone();
        request.app_id = self.app_id.clone();
        request.app_secret = self.app_secret.clone();

        let mut resilience = config.resilience.to_settings();
        if let Some(score) = self.minimal_health_score {
            resilience.minimal_health_score = score;
        }
        if let Some(count) = self.retry_count {
            resilience.retry_count = count;
        }
        if let Some(wait) = self.retry_wait {
            resilience.retry_wait = Duration::from_secs(wait);
        }
        if let Some(timeout) = self.request_timeout {
            resilience.request_timeout = Duration::from_millis(timeout);
        }
        request.resilience = resilience;

        Ok(request)
    }
}

fn print_connection(connection: &Connection) {
    let settings = &connection.resilience;
    let health = if settings.health_check_enabled() {
        settings.minimal_health_score.to_string()
    } else {
        "disabled".to_string()
    };

    println!();
    println!("  {}", "✓ Connected".bright_green().bold());
    println!("    {}: {}", "Url".dimmed(), connection.url.as_str().cyan());
    println!("    {}: {}", "Method".dimmed(), connection.strategy.to_string().bright_blue());
    println!("    {}: {}", "Site type".dimmed(), connection.connection_type.to_string().white());
    println!("    {}: {}", "Context".dimmed(), connection.context.describe().white());
    println!("    {}: {}", "Health check".dimmed(), health.white());
    println!(
        "    {}: {} x {}s",
        "Retries".dimmed(),
        settings.retry_count.to_string().white(),
        settings.retry_wait.as_secs()
    );
    println!("    {}: {}ms", "Timeout".dimmed(), settings.request_timeout.as_millis());
}

pub async fn connect_command(args: ConnectCommands, config: &Config) -> Result<()> {
    let request = args.to_request(config)?;

    let token_cache = TokenCache::new(config.token_cache_path()?);
    let provider: Arc<dyn AuthProvider> = Arc::new(HttpAuthProvider::new(token_cache.clone())?);
    let host: Arc<dyn InteractiveHost> = if args.non_interactive {
        Arc::new(NonInteractiveHost)
    } else {
        Arc::new(TerminalHost)
    };
    let store = Arc::new(KeyringStore::new(config.keyring_service()));

    let manager = ConnectionManager::new(store, host, provider, token_cache);

    match manager.connect(&request).await {
        Ok(connection) => {
            print_connection(&connection);
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("  {} {}", "⚠️ ".bright_yellow(), e.to_string().bright_yellow());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to connect to {}", request.url)),
    }
}
