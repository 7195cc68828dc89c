use std::sync::Arc;

use super::models::Connection;
use super::registry::ConnectionRegistry;
use crate::auth::{
    AuthProvider, AuthStrategy, ConnectionFactory, ConnectionRequest, ConnectionTarget,
    CredentialStore, InteractiveHost, TokenCache,
};
use crate::error::Result;

/// Connects to sites and keeps the current connection
pub struct ConnectionManager {
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn InteractiveHost>,
    provider: Arc<dyn AuthProvider>,
    token_cache: TokenCache,
    registry: ConnectionRegistry,
}

impl ConnectionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn InteractiveHost>,
        provider: Arc<dyn AuthProvider>,
        token_cache: TokenCache,
    ) -> Self {
        Self {
            store,
            host,
            provider,
            token_cache,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Select a strategy for `request`, authenticate and make the result
    /// the current connection.
    ///
    /// On any error the previously registered connection stays current.
    pub async fn connect(&self, request: &ConnectionRequest) -> Result<Arc<Connection>> {
        let strategy = AuthStrategy::select(request)?;
        log::info!("Connecting to {} using {}", request.url, strategy.kind());

        let factory = ConnectionFactory::new(
            self.store.as_ref(),
            self.host.as_ref(),
            self.provider.as_ref(),
            &self.token_cache,
        );

        let connection = factory
            .build(&ConnectionTarget::from_request(request), strategy)
            .await
            .inspect_err(|e| log::warn!("Connection to {} failed: {}", request.url, e))?;

        log::info!(
            "Connected to {} ({}, {})",
            connection.url,
            connection.connection_type,
            connection.context.describe()
        );
        Ok(self.registry.set(connection))
    }

    /// Get the current connection, if any
    pub fn current(&self) -> Option<Arc<Connection>> {
        self.registry.get()
    }
}
