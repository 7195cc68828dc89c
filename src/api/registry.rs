//! Current-connection registry
//!
//! A single replaceable slot. Each successful connect swaps the new
//! connection in atomically; readers holding the old `Arc` keep it alive
//! until they drop it, but `get` only ever returns the latest one.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::models::Connection;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    current: ArcSwapOption<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current connection, returning the registered handle
    pub fn set(&self, connection: Connection) -> Arc<Connection> {
        let connection = Arc::new(connection);
        if let Some(previous) = self.current.swap(Some(connection.clone())) {
            log::debug!("Replaced connection to {}", previous.url);
        }
        connection
    }

    pub fn get(&self) -> Option<Arc<Connection>> {
        self.current.load_full()
    }

    /// Drop the current connection
    pub fn clear(&self) -> Option<Arc<Connection>> {
        self.current.swap(None)
    }
}
