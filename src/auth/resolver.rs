//! Hierarchical lookup of stored credentials for a site URL
//!
//! Keys are probed from most to least specific:
//!
//! 1. the full URL
//! 2. `scheme://authority` + path, dropping one trailing segment at a time
//! 3. `scheme://authority`
//! 4. the bare host
//!
//! The authority carries the port only when it is not the scheme default.
//! The first hit wins, so a deep-path credential always beats a site-wide one.

use log::debug;
use url::Url;

use super::request::CredentialPair;
use super::store::CredentialStore;
use crate::error::Result;

/// Build the ordered list of store keys probed for `url`.
///
/// Consecutive duplicates are collapsed, so a URL without a path is not
/// probed twice under the same key.
pub fn lookup_keys(url: &Url) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut push = |key: String| {
        if keys.last() != Some(&key) {
            keys.push(key);
        }
    };

    push(url.as_str().to_string());

    let host = url.host_str().unwrap_or_default();
    let origin = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };

    let mut path = url.path().trim_end_matches('/');
    while !path.is_empty() {
        push(format!("{}{}", origin, path));
        path = match path.rfind('/') {
            Some(idx) => &path[..idx],
            None => "",
        };
    }

    push(origin);
    push(host.to_string());

    keys
}

/// Finds stored credentials for a site URL
pub struct CredentialResolver<'a> {
    store: &'a dyn CredentialStore,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(store: &'a dyn CredentialStore) -> Self {
        Self { store }
    }

    /// Return the most specific stored credential for `url`, or `None`
    pub fn resolve(&self, url: &Url) -> Result<Option<CredentialPair>> {
        Ok(self.resolve_with_key(url)?.map(|(_, credentials)| credentials))
    }

    /// Like [`resolve`](Self::resolve) but also reports which key matched
    pub fn resolve_with_key(&self, url: &Url) -> Result<Option<(String, CredentialPair)>> {
        for key in lookup_keys(url) {
            debug!("Looking up stored credentials for '{}'", key);
            if let Some(credentials) = self.store.lookup(&key)? {
                debug!("Using stored credentials '{}'", key);
                return Ok(Some((key, credentials)));
            }
        }

        debug!("No stored credentials match {}", url);
        Ok(None)
    }
}
