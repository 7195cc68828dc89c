//! Remote authentication endpoints
//!
//! [`AuthProvider`] is the seam between strategy logic and the network.
//! [`HttpAuthProvider`] talks to Azure ACS, Azure AD, ADFS and the
//! SharePoint Online claims endpoints over reqwest.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use reqwest::Client;
use reqwest::header::{HeaderMap, LOCATION, SET_COOKIE, WWW_AUTHENTICATE};
use serde::{Deserialize, Serialize};
use url::Url;

use super::certificate::ClientCertificate;
use super::request::CredentialPair;
use super::token_cache::{CachedToken, TokenCache};
use crate::api::models::AuthContext;
use crate::error::{ConnectError, Result};

pub const AAD_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const ACS_HOST: &str = "https://accounts.accesscontrol.windows.net";
/// Well-known principal id of SharePoint in Azure ACS
pub const SHAREPOINT_PRINCIPAL: &str = "00000003-0000-0ff1-ce00-000000000000";
const SPO_STS_ENDPOINT: &str = "https://login.microsoftonline.com/extSTS.srf";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Find the ACS realm (tenant id) of the site
    async fn discover_realm(&self, url: &Url) -> Result<String>;

    /// Client-credential exchange against Azure ACS
    async fn app_only_token(
        &self,
        url: &Url,
        realm: &str,
        app_id: &str,
        app_secret: &str,
    ) -> Result<AuthContext>;

    /// Federated sign-in through the site's ADFS trust
    async fn adfs_login(&self, url: &Url, credentials: &CredentialPair) -> Result<AuthContext>;

    /// Redeem a cached refresh token for the native application, if one exists
    async fn cached_native_token(&self, url: &Url, client_id: &str) -> Result<Option<AuthContext>>;

    /// Exchange an authorization code obtained through the browser
    async fn redeem_authorization_code(
        &self,
        url: &Url,
        client_id: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<AuthContext>;

    /// Client-credential exchange signed with a certificate
    async fn certificate_token(
        &self,
        url: &Url,
        tenant: &str,
        client_id: &str,
        certificate: &ClientCertificate,
    ) -> Result<AuthContext>;

    /// Username/password sign-in. `online` selects SharePoint Online claims
    /// over on-premises basic authentication.
    async fn user_credentials(
        &self,
        url: &Url,
        online: bool,
        credentials: &CredentialPair,
    ) -> Result<AuthContext>;
}

/// `scheme://host[:port]` of a site url
pub fn site_origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Site url without a trailing slash
fn site_root(url: &Url) -> String {
    let mut root = url.clone();
    root.set_query(None);
    root.set_fragment(None);
    root.as_str().trim_end_matches('/').to_string()
}

/// Azure AD authorize endpoint for the native application code flow
pub fn native_authorize_url(client_id: &str, redirect_uri: &str, resource: &str) -> String {
    format!(
        "{}/common/oauth2/authorize?response_type=code&client_id={}&redirect_uri={}&resource={}&prompt=select_account",
        AAD_AUTHORITY,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(resource),
    )
}

/// Extract `realm="..."` from a bearer challenge
pub fn parse_realm(challenge: &str) -> Option<String> {
    let start = challenge.find("realm=\"")? + "realm=\"".len();
    let rest = &challenge[start..];
    let end = rest.find('"')?;
    let realm = rest[..end].trim();
    if realm.is_empty() {
        None
    } else {
        Some(realm.to_string())
    }
}

/// Value of cookie `name` from the response's Set-Cookie headers
fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .find(|pair| pair.starts_with(&prefix))
        .map(|pair| pair[prefix.len()..].to_string())
        .filter(|value| !value.is_empty())
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// WS-Trust issue request carrying a username token
struct SecurityTokenRequest<'a> {
    action: &'a str,
    to: &'a str,
    applies_to: &'a str,
    trust_namespace: &'a str,
    key_type: &'a str,
    request_type: &'a str,
}

impl SecurityTokenRequest<'_> {
    fn envelope(&self, credentials: &CredentialPair) -> String {
        format!(
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
  <s:Header>
    <a:Action s:mustUnderstand="1">{action}</a:Action>
    <a:ReplyTo><a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address></a:ReplyTo>
    <a:To s:mustUnderstand="1">{to}</a:To>
    <o:Security s:mustUnderstand="1" xmlns:o="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <o:UsernameToken u:Id="uuid-{id}">
        <o:Username>{username}</o:Username>
        <o:Password>{password}</o:Password>
      </o:UsernameToken>
    </o:Security>
  </s:Header>
  <s:Body>
    <t:RequestSecurityToken xmlns:t="{trust}">
      <wsp:AppliesTo xmlns:wsp="http://schemas.xmlsoap.org/ws/2004/09/policy">
        <a:EndpointReference><a:Address>{applies_to}</a:Address></a:EndpointReference>
      </wsp:AppliesTo>
      <t:KeyType>{key_type}</t:KeyType>
      <t:RequestType>{request_type}</t:RequestType>
      <t:TokenType>urn:oasis:names:tc:SAML:1.0:assertion</t:TokenType>
    </t:RequestSecurityToken>
  </s:Body>
</s:Envelope>"#,
            action = self.action,
            to = xml_escape(self.to),
            id = uuid::Uuid::new_v4(),
            username = xml_escape(credentials.username()),
            password = xml_escape(credentials.password()),
            trust = self.trust_namespace,
            applies_to = xml_escape(self.applies_to),
            key_type = self.key_type,
            request_type = self.request_type,
        )
    }
}

/// Reason text of a SOAP fault, if the document is one
fn soap_fault(doc: &roxmltree::Document) -> Option<String> {
    let fault = doc.descendants().find(|n| n.tag_name().name() == "Fault")?;
    let reason = fault
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(if reason.is_empty() { "SOAP fault".to_string() } else { reason })
}

/// Text of the first `BinarySecurityToken` in a security token response
pub fn parse_binary_security_token(xml: &str) -> Result<String> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ConnectError::authentication_with("invalid security token response", e))?;

    if let Some(reason) = soap_fault(&doc) {
        return Err(ConnectError::authentication(reason));
    }

    doc.descendants()
        .find(|n| n.tag_name().name() == "BinarySecurityToken")
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConnectError::authentication("security token response carried no token"))
}

/// Raw XML of the token response to post back to the relying party.
///
/// The subtree is cut out of the envelope, so prefixes declared on its
/// ancestors are re-declared on the extracted root element.
pub fn parse_token_response_xml(xml: &str) -> Result<String> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ConnectError::authentication_with("invalid ADFS response", e))?;

    if let Some(reason) = soap_fault(&doc) {
        return Err(ConnectError::authentication(reason));
    }

    let node = doc
        .descendants()
        .find(|n| n.tag_name().name() == "RequestSecurityTokenResponseCollection")
        .or_else(|| {
            doc.descendants()
                .find(|n| n.tag_name().name() == "RequestSecurityTokenResponse")
        })
        .ok_or_else(|| ConnectError::authentication("ADFS response carried no token"))?;

    Ok(redeclare_namespaces(node, &xml[node.range()]))
}

/// Length of the start tag at the beginning of `raw`, quotes respected
fn start_tag_len(raw: &str) -> usize {
    let mut quote = None;
    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, '>') => return i + 1,
            _ => {}
        }
    }
    raw.len()
}

fn declares(start_tag: &str, attribute: &str) -> bool {
    start_tag.match_indices(attribute).any(|(i, _)| {
        let before = start_tag[..i].chars().next_back();
        let after = start_tag[i + attribute.len()..].trim_start();
        before.is_some_and(char::is_whitespace) && after.starts_with('=')
    })
}

fn redeclare_namespaces(node: roxmltree::Node, raw: &str) -> String {
    let start_tag = &raw[..start_tag_len(raw)];
    let name_end = raw
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace() || *c == '/' || *c == '>')
        .map_or(raw.len(), |(i, _)| i);

    let mut declarations = String::new();
    for namespace in node.namespaces() {
        let attribute = match namespace.name() {
            Some("xml") => continue,
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        if !declares(start_tag, &attribute) {
            declarations.push_str(&format!(" {}=\"{}\"", attribute, xml_escape(namespace.uri())));
        }
    }

    format!("{}{}{}", &raw[..name_end], declarations, &raw[name_end..])
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// ACS returns `expires_in` as a string, Azure AD as either
    fn expires_at(&self) -> Option<SystemTime> {
        let seconds = match self.expires_in.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64()?,
            serde_json::Value::String(s) => s.parse().ok()?,
            _ => return None,
        };
        Some(SystemTime::now() + Duration::from_secs(seconds))
    }

    fn into_context(self) -> AuthContext {
        let expires_at = self.expires_at();
        AuthContext::bearer(self.access_token, expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims {
    aud: String,
    iss: String,
    sub: String,
    jti: String,
    nbf: i64,
    exp: i64,
}

/// RS256 client assertion for `endpoint`, identified by the certificate's
/// `x5t#S256` thumbprint
fn client_assertion(endpoint: &str, client_id: &str, certificate: &ClientCertificate) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = AssertionClaims {
        aud: endpoint.to_string(),
        iss: client_id.to_string(),
        sub: client_id.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        nbf: now,
        exp: now + 600,
    };

    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.x5t_s256 = Some(certificate.thumbprint().to_string());

    let key = jsonwebtoken::EncodingKey::from_rsa_der(certificate.private_key_der());
    jsonwebtoken::encode(&header, &claims, &key).map_err(|e| {
        ConnectError::certificate(certificate.path(), format!("cannot sign client assertion: {}", e))
    })
}

pub struct HttpAuthProvider {
    client: Client,
    token_cache: TokenCache,
}

impl HttpAuthProvider {
    pub fn new(token_cache: TokenCache) -> Result<Self> {
        // Sign-in flows read Location and Set-Cookie off redirects themselves
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConnectError::authentication_with("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            token_cache,
        })
    }

    async fn post_token_form(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(endpoint).form(form).send().await?;
        let status = response.status();
        debug!("Token request to {} returned {}", endpoint, status);

        if status.is_success() {
            return response
                .json::<TokenResponse>()
                .await
                .map_err(|e| ConnectError::authentication_with("malformed token response", e));
        }

        let body = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(TokenErrorResponse {
                error_description: Some(description),
                ..
            }) => description,
            Ok(TokenErrorResponse { error: Some(error), .. }) => error,
            _ => body,
        };
        Err(ConnectError::authentication(format!(
            "token request failed ({}): {}",
            status, reason
        )))
    }

    fn remember_refresh_token(&self, client_id: &str, resource: &str, response: &TokenResponse) {
        let Some(refresh_token) = response.refresh_token.clone() else {
            return;
        };

        let cached = CachedToken {
            refresh_token,
            expires_on: None,
        };
        if let Err(e) = self.token_cache.put(client_id, resource, cached) {
            log::warn!("Could not update token cache: {}", e);
        }
    }

    async fn post_security_token(&self, endpoint: &str, envelope: String) -> Result<String> {
        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/soap+xml; charset=utf-8")
            .body(envelope)
            .send()
            .await?;

        debug!("Security token request to {} returned {}", endpoint, response.status());
        Ok(response.text().await?)
    }

    async fn online_claims_login(&self, url: &Url, credentials: &CredentialPair) -> Result<AuthContext> {
        let origin = site_origin(url);
        let request = SecurityTokenRequest {
            action: "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue",
            to: SPO_STS_ENDPOINT,
            applies_to: &origin,
            trust_namespace: "http://schemas.xmlsoap.org/ws/2005/02/trust",
            key_type: "http://schemas.xmlsoap.org/ws/2005/05/identity/NoProofKey",
            request_type: "http://schemas.xmlsoap.org/ws/2005/02/trust/Issue",
        };

        let xml = self
            .post_security_token(SPO_STS_ENDPOINT, request.envelope(credentials))
            .await?;
        let token = parse_binary_security_token(&xml)?;

        let response = self
            .client
            .post(format!("{}/_forms/default.aspx?wa=wsignin1.0", origin))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(token)
            .send()
            .await?;

        let fed_auth = find_cookie(response.headers(), "FedAuth").ok_or_else(|| {
            ConnectError::authentication(format!(
                "{} did not issue a FedAuth cookie ({})",
                origin,
                response.status()
            ))
        })?;

        Ok(AuthContext::Cookies {
            fed_auth,
            rt_fa: find_cookie(response.headers(), "rtFa"),
        })
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn discover_realm(&self, url: &Url) -> Result<String> {
        let endpoint = format!("{}/_vti_bin/client.svc", site_root(url));
        debug!("Discovering realm via {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .header(reqwest::header::AUTHORIZATION, "Bearer")
            .send()
            .await?;

        response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_realm)
            .ok_or_else(|| {
                ConnectError::authentication(format!(
                    "could not discover the realm of {} ({})",
                    url,
                    response.status()
                ))
            })
    }

    async fn app_only_token(
        &self,
        url: &Url,
        realm: &str,
        app_id: &str,
        app_secret: &str,
    ) -> Result<AuthContext> {
        let host = url.host_str().unwrap_or_default();
        let endpoint = format!("{}/{}/tokens/OAuth/2", ACS_HOST, realm);
        let client_id = format!("{}@{}", app_id, realm);
        let resource = format!("{}/{}@{}", SHAREPOINT_PRINCIPAL, host, realm);

        let response = self
            .post_token_form(
                &endpoint,
                &[
                    ("grant_type", "client_credentials"),
                    ("client_id", &client_id),
                    ("client_secret", app_secret),
                    ("resource", &resource),
                ],
            )
            .await?;

        Ok(response.into_context())
    }

    async fn adfs_login(&self, url: &Url, credentials: &CredentialPair) -> Result<AuthContext> {
        let origin = site_origin(url);
        let trust_endpoint = format!("{}/_trust/", origin);

        let response = self.client.get(&trust_endpoint).send().await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ConnectError::authentication(format!(
                    "{} did not redirect to a federation server ({})",
                    trust_endpoint,
                    response.status()
                ))
            })?;

        let federation = Url::parse(location)
            .map_err(|e| ConnectError::authentication_with("invalid federation redirect", e))?;
        let adfs_host = federation
            .host_str()
            .ok_or_else(|| ConnectError::authentication("federation redirect has no host"))?
            .to_string();

        let query = |name: &str| {
            federation
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        let relying_party = query("wtrealm")
            .ok_or_else(|| ConnectError::authentication("federation redirect has no wtrealm"))?;
        let context = query("wctx")
            .unwrap_or_else(|| format!("{}/_layouts/15/Authenticate.aspx?Source=%2F", origin));

        let endpoint = format!("https://{}/adfs/services/trust/13/usernamemixed", adfs_host);
        debug!("Requesting ADFS token from {} for {}", endpoint, relying_party);

        let request = SecurityTokenRequest {
            action: "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue",
            to: &endpoint,
            applies_to: &relying_party,
            trust_namespace: "http://docs.oasis-open.org/ws-sx/ws-trust/200512",
            key_type: "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Bearer",
            request_type: "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Issue",
        };
        let xml = self
            .post_security_token(&endpoint, request.envelope(credentials))
            .await?;
        let token_response = parse_token_response_xml(&xml)?;

        let response = self
            .client
            .post(&trust_endpoint)
            .form(&[
                ("wa", "wsignin1.0"),
                ("wresult", token_response.as_str()),
                ("wctx", context.as_str()),
            ])
            .send()
            .await?;

        let fed_auth = find_cookie(response.headers(), "FedAuth").ok_or_else(|| {
            ConnectError::authentication(format!(
                "{} rejected the ADFS token ({})",
                origin,
                response.status()
            ))
        })?;

        Ok(AuthContext::Cookies {
            fed_auth,
            rt_fa: None,
        })
    }

    async fn cached_native_token(&self, url: &Url, client_id: &str) -> Result<Option<AuthContext>> {
        let resource = site_origin(url);
        let Some(cached) = self.token_cache.get(client_id, &resource) else {
            debug!("No cached token for client {} and {}", client_id, resource);
            return Ok(None);
        };

        let endpoint = format!("{}/common/oauth2/token", AAD_AUTHORITY);
        let result = self
            .post_token_form(
                &endpoint,
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", client_id),
                    ("refresh_token", &cached.refresh_token),
                    ("resource", &resource),
                ],
            )
            .await;

        match result {
            Ok(response) => {
                self.remember_refresh_token(client_id, &resource, &response);
                Ok(Some(response.into_context()))
            }
            Err(e) => {
                log::warn!("Cached token for {} was not accepted, signing in again: {}", resource, e);
                Ok(None)
            }
        }
    }

    async fn redeem_authorization_code(
        &self,
        url: &Url,
        client_id: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<AuthContext> {
        let resource = site_origin(url);
        let endpoint = format!("{}/common/oauth2/token", AAD_AUTHORITY);

        let response = self
            .post_token_form(
                &endpoint,
                &[
                    ("grant_type", "authorization_code"),
                    ("client_id", client_id),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                    ("resource", &resource),
                ],
            )
            .await?;

        self.remember_refresh_token(client_id, &resource, &response);
        Ok(response.into_context())
    }

    async fn certificate_token(
        &self,
        url: &Url,
        tenant: &str,
        client_id: &str,
        certificate: &ClientCertificate,
    ) -> Result<AuthContext> {
        let resource = site_origin(url);
        let endpoint = format!("{}/{}/oauth2/token", AAD_AUTHORITY, tenant);

        let assertion = client_assertion(&endpoint, client_id, certificate)?;

        let response = self
            .post_token_form(
                &endpoint,
                &[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id),
                    ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                    ("client_assertion", &assertion),
                    ("resource", &resource),
                ],
            )
            .await?;

        Ok(response.into_context())
    }

    async fn user_credentials(
        &self,
        url: &Url,
        online: bool,
        credentials: &CredentialPair,
    ) -> Result<AuthContext> {
        if online {
            return self.online_claims_login(url, credentials).await;
        }

        let encoded = STANDARD.encode(format!("{}:{}", credentials.username(), credentials.password()));
        Ok(AuthContext::AuthorizationHeader(format!("Basic {}", encoded)))
    }
}
