//! Connections and the state that outlives a connect call

pub mod manager;
pub mod models;
pub mod registry;
pub mod resilience;

pub use manager::ConnectionManager;
pub use models::{AuthContext, Connection, ConnectionType};
pub use registry::ConnectionRegistry;
pub use resilience::{ResilienceSettings, ResilienceSettingsBuilder};
