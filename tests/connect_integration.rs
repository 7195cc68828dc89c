//! End-to-end connect flow with scripted network and host

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sharepoint_connect::api::{AuthContext, ConnectionManager, ConnectionType, ResilienceSettings};
use sharepoint_connect::auth::{
    AuthProvider, ClientCertificate, ConnectionRequest, CredentialPair, CredentialStore,
    InteractiveHost, MemoryStore, NonInteractiveHost, StrategyKind, TokenCache,
};
use sharepoint_connect::error::{ConnectError, Result};
use url::Url;

/// Answers every call with a canned context and records what was asked
#[derive(Default)]
struct FakeProvider {
    calls: Mutex<Vec<String>>,
    cached_native: Option<AuthContext>,
    reject_credentials: bool,
}

impl FakeProvider {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check_credentials(&self) -> Result<()> {
        if self.reject_credentials {
            let cause = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "401 Unauthorized");
            return Err(ConnectError::authentication_with("the site rejected the credentials", cause));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    async fn discover_realm(&self, _url: &Url) -> Result<String> {
        self.record("discover_realm");
        Ok("discovered-realm".to_string())
    }

    async fn app_only_token(
        &self,
        _url: &Url,
        realm: &str,
        app_id: &str,
        _app_secret: &str,
    ) -> Result<AuthContext> {
        self.record(format!("app_only_token {} {}", realm, app_id));
        Ok(AuthContext::bearer("acs-token", None))
    }

    async fn adfs_login(&self, _url: &Url, credentials: &CredentialPair) -> Result<AuthContext> {
        self.record(format!("adfs_login {}", credentials.username()));
        self.check_credentials()?;
        Ok(AuthContext::Cookies {
            fed_auth: "fed".to_string(),
            rt_fa: None,
        })
    }

    async fn cached_native_token(&self, _url: &Url, client_id: &str) -> Result<Option<AuthContext>> {
        self.record(format!("cached_native_token {}", client_id));
        Ok(self.cached_native.clone())
    }

    async fn redeem_authorization_code(
        &self,
        _url: &Url,
        _client_id: &str,
        _redirect_uri: &str,
        code: &str,
    ) -> Result<AuthContext> {
        self.record(format!("redeem_authorization_code {}", code));
        Ok(AuthContext::bearer("aad-token", None))
    }

    async fn certificate_token(
        &self,
        _url: &Url,
        tenant: &str,
        _client_id: &str,
        _certificate: &ClientCertificate,
    ) -> Result<AuthContext> {
        self.record(format!("certificate_token {}", tenant));
        Ok(AuthContext::bearer("cert-token", None))
    }

    async fn user_credentials(
        &self,
        _url: &Url,
        online: bool,
        credentials: &CredentialPair,
    ) -> Result<AuthContext> {
        self.record(format!("user_credentials {} {}", online, credentials.username()));
        self.check_credentials()?;
        Ok(AuthContext::AuthorizationHeader("Basic xyz".to_string()))
    }
}

/// Host with scripted answers
struct ScriptedHost {
    credentials: Option<CredentialPair>,
    browser_answer: String,
    browser_urls: Mutex<Vec<String>>,
}

impl ScriptedHost {
    fn new(browser_answer: &str) -> Self {
        Self {
            credentials: None,
            browser_answer: browser_answer.to_string(),
            browser_urls: Mutex::new(Vec::new()),
        }
    }

    fn with_credentials(mut self, credentials: CredentialPair) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl InteractiveHost for ScriptedHost {
    fn prompt_for_credential(&self, title: &str, _prompt: &str) -> Result<CredentialPair> {
        self.credentials
            .clone()
            .ok_or_else(|| ConnectError::cancelled(format!("no answer for {}", title)))
    }

    fn open_browser_login(&self, url: &str) -> Result<String> {
        self.browser_urls.lock().unwrap().push(url.to_string());
        Ok(self.browser_answer.clone())
    }
}

/// Fails the test if the store is consulted at all
struct UntouchableStore;

impl CredentialStore for UntouchableStore {
    fn lookup(&self, key: &str) -> Result<Option<CredentialPair>> {
        panic!("credential store consulted for '{}'", key);
    }
}

struct Harness {
    manager: ConnectionManager,
    provider: Arc<FakeProvider>,
    _dir: tempfile::TempDir,
    cache_path: std::path::PathBuf,
}

fn harness(
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn InteractiveHost>,
    provider: FakeProvider,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("tokens.json");
    let provider = Arc::new(provider);
    let manager = ConnectionManager::new(store, host, provider.clone(), TokenCache::new(&cache_path));
    Harness {
        manager,
        provider,
        _dir: dir,
        cache_path,
    }
}

const SITE: &str = "https://contoso.sharepoint.com/sites/hr";

fn request() -> ConnectionRequest {
    ConnectionRequest::new(SITE).unwrap()
}

#[tokio::test]
async fn test_token_strategy_discovers_realm() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = request();
    req.app_id = Some("app".to_string());
    req.app_secret = Some("secret".to_string());

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.strategy, StrategyKind::Token);
    assert_eq!(
        h.provider.calls(),
        vec!["discover_realm", "app_only_token discovered-realm app"]
    );
}

#[tokio::test]
async fn test_token_strategy_with_realm_skips_discovery() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = request();
    req.realm = Some("my-realm".to_string());
    req.app_id = Some("app".to_string());
    req.app_secret = Some("secret".to_string());

    h.manager.connect(&req).await.unwrap();

    assert_eq!(h.provider.calls(), vec!["app_only_token my-realm app"]);
}

#[tokio::test]
async fn test_web_login_uses_host_only() {
    let host = Arc::new(ScriptedHost::new("FedAuth-cookie"));
    let h = harness(Arc::new(UntouchableStore), host.clone(), FakeProvider::default());
    let mut req = request();
    req.use_web_login = true;

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.strategy, StrategyKind::WebLogin);
    assert!(matches!(connection.context, AuthContext::Cookies { .. }));
    assert!(h.provider.calls().is_empty());

    let urls = host.browser_urls.lock().unwrap().clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://contoso.sharepoint.com/_layouts/15/Authenticate.aspx?Source="));
}

#[tokio::test]
async fn test_cancelled_web_login_leaves_registry_alone() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedHost::new("  ")),
        FakeProvider::default(),
    );
    let mut req = request();
    req.use_web_login = true;

    let err = h.manager.connect(&req).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(h.manager.current().is_none());
}

#[tokio::test]
async fn test_adfs_prefers_stored_credentials_over_prompt() {
    let store = MemoryStore::new().with(
        "contoso.sharepoint.com",
        CredentialPair::new("stored@contoso.com", "p"),
    );
    let host = ScriptedHost::new("").with_credentials(CredentialPair::new("prompted", "p"));
    let h = harness(Arc::new(store), Arc::new(host), FakeProvider::default());
    let mut req = request();
    req.use_adfs = true;

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.strategy, StrategyKind::Adfs);
    assert_eq!(h.provider.calls(), vec!["adfs_login stored@contoso.com"]);
}

#[tokio::test]
async fn test_default_prompts_when_nothing_stored() {
    let host = ScriptedHost::new("").with_credentials(CredentialPair::new("prompted", "p"));
    let h = harness(Arc::new(MemoryStore::new()), Arc::new(host), FakeProvider::default());

    let connection = h.manager.connect(&request()).await.unwrap();

    assert_eq!(connection.strategy, StrategyKind::Default);
    assert_eq!(h.provider.calls(), vec!["user_credentials true prompted"]);
}

#[tokio::test]
async fn test_non_interactive_without_credentials_fails() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );

    let err = h.manager.connect(&request()).await.unwrap_err();

    match err {
        ConnectError::NoCredentials { url } => assert_eq!(url, SITE),
        other => panic!("expected NoCredentials, got {:?}", other),
    }
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_current_identity_never_consults_store() {
    let h = harness(
        Arc::new(UntouchableStore),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = request();
    req.current_identity = true;

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.context, AuthContext::CurrentUser);
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_on_premises_site_uses_basic_credentials() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let req = ConnectionRequest::new("http://intranet.contoso.local/sites/hr")
        .unwrap()
        .with_credentials(CredentialPair::new("CONTOSO\\alice", "p"));

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.connection_type, ConnectionType::OnPremises);
    assert_eq!(h.provider.calls(), vec!["user_credentials false CONTOSO\\alice"]);
}

#[tokio::test]
async fn test_native_aad_uses_cached_token() {
    let provider = FakeProvider {
        cached_native: Some(AuthContext::bearer("cached", None)),
        ..Default::default()
    };
    let h = harness(Arc::new(MemoryStore::new()), Arc::new(NonInteractiveHost), provider);
    let mut req = request();
    req.client_id = Some("client".to_string());
    req.redirect_uri = Some("https://localhost/callback".to_string());

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.strategy, StrategyKind::NativeAad);
    assert_eq!(h.provider.calls(), vec!["cached_native_token client"]);
}

#[tokio::test]
async fn test_native_aad_browser_code_flow() {
    let host = ScriptedHost::new("https://localhost/callback?code=the-code&session_state=s");
    let h = harness(Arc::new(MemoryStore::new()), Arc::new(host), FakeProvider::default());
    let mut req = request();
    req.client_id = Some("client".to_string());
    req.redirect_uri = Some("https://localhost/callback".to_string());

    h.manager.connect(&req).await.unwrap();

    assert_eq!(
        h.provider.calls(),
        vec!["cached_native_token client", "redeem_authorization_code the-code"]
    );
}

#[tokio::test]
async fn test_clear_token_cache_removes_file() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedHost::new("code")),
        FakeProvider::default(),
    );
    std::fs::write(&h.cache_path, "{}").unwrap();

    let mut req = request();
    req.client_id = Some("client".to_string());
    req.redirect_uri = Some("https://localhost/callback".to_string());
    req.clear_token_cache = true;

    h.manager.connect(&req).await.unwrap();
    assert!(!h.cache_path.exists());

    // Clearing an absent cache is fine
    h.manager.connect(&req).await.unwrap();
}

#[tokio::test]
async fn test_bad_certificate_reports_certificate_error() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = request();
    req.client_id = Some("client".to_string());
    req.tenant = Some("contoso.onmicrosoft.com".to_string());
    req.certificate_path = Some(h.cache_path.with_file_name("missing.pfx"));
    req.certificate_password = Some("pw".to_string());

    let err = h.manager.connect(&req).await.unwrap_err();

    assert!(matches!(err, ConnectError::Certificate { .. }));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_conflicting_groups_rejected_before_any_work() {
    let h = harness(
        Arc::new(UntouchableStore),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = request();
    req.use_web_login = true;
    req.use_adfs = true;

    let err = h.manager.connect(&req).await.unwrap_err();

    assert!(matches!(err, ConnectError::Configuration(_)));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_failed_connect_keeps_previous_connection() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut first = request();
    first.current_identity = true;
    let established = h.manager.connect(&first).await.unwrap();

    let mut second = request();
    second.use_web_login = true;
    assert!(h.manager.connect(&second).await.is_err());

    let current = h.manager.current().unwrap();
    assert!(Arc::ptr_eq(&current, &established));
}

#[tokio::test]
async fn test_rejected_credentials_keep_previous_connection() {
    let provider = FakeProvider {
        reject_credentials: true,
        ..Default::default()
    };
    let h = harness(Arc::new(MemoryStore::new()), Arc::new(NonInteractiveHost), provider);
    let mut first = request();
    first.current_identity = true;
    let established = h.manager.connect(&first).await.unwrap();

    let second = request().with_credentials(CredentialPair::new("alice@contoso.com", "wrong"));
    let err = h.manager.connect(&second).await.unwrap_err();

    match &err {
        ConnectError::Authentication { message, .. } => assert!(message.contains("rejected")),
        other => panic!("expected authentication error, got {:?}", other),
    }
    let cause = std::error::Error::source(&err).expect("cause is kept");
    assert!(cause.to_string().contains("401"));

    assert_eq!(h.provider.calls(), vec!["user_credentials true alice@contoso.com"]);
    let current = h.manager.current().unwrap();
    assert!(Arc::ptr_eq(&current, &established));
}

#[tokio::test]
async fn test_rejected_adfs_login_is_authentication_error() {
    let provider = FakeProvider {
        reject_credentials: true,
        ..Default::default()
    };
    let h = harness(Arc::new(MemoryStore::new()), Arc::new(NonInteractiveHost), provider);
    let mut req = request().with_credentials(CredentialPair::new("alice@contoso.com", "wrong"));
    req.use_adfs = true;

    let err = h.manager.connect(&req).await.unwrap_err();

    assert!(matches!(err, ConnectError::Authentication { .. }));
    assert!(std::error::Error::source(&err).is_some());
    assert!(h.manager.current().is_none());
}

#[tokio::test]
async fn test_app_only_aad_with_certificate() {
    let h = harness(
        Arc::new(UntouchableStore),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = request();
    req.client_id = Some("client".to_string());
    req.tenant = Some("contoso.onmicrosoft.com".to_string());
    req.certificate_path = Some(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/app-modern.pfx"),
    );
    req.certificate_password = Some("pw".to_string());

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.strategy, StrategyKind::AppOnlyAad);
    assert_eq!(h.provider.calls(), vec!["certificate_token contoso.onmicrosoft.com"]);
}

#[tokio::test]
async fn test_resilience_settings_carried_unchanged() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let settings = ResilienceSettings::builder()
        .minimal_health_score(5)
        .retry_count(3)
        .retry_wait(Duration::from_secs(7))
        .request_timeout(Duration::from_millis(60_000))
        .build();
    let mut req = request().with_resilience(settings.clone());
    req.current_identity = true;
    req.skip_admin_check = true;

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.resilience, settings);
    assert!(connection.skip_admin_check);
}

#[tokio::test]
async fn test_admin_site_detected() {
    let h = harness(
        Arc::new(MemoryStore::new()),
        Arc::new(NonInteractiveHost),
        FakeProvider::default(),
    );
    let mut req = ConnectionRequest::new("https://contoso-admin.sharepoint.com").unwrap();
    req.current_identity = true;

    let connection = h.manager.connect(&req).await.unwrap();

    assert_eq!(connection.connection_type, ConnectionType::TenantAdmin);
}
