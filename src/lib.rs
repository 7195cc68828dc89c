//! Authenticated SharePoint connections
//!
//! Pick an authentication strategy from the supplied parameters, find
//! credentials in the OS keychain when needed, and keep the resulting
//! connection as the current one for later operations.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

pub use api::{Connection, ConnectionManager, ConnectionRegistry};
pub use auth::{AuthStrategy, ConnectionRequest, CredentialPair};
pub use error::{ConnectError, Result};
