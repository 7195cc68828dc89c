//! Authentication: strategy selection, credential resolution and the
//! builders that turn a strategy into an authenticated connection

pub mod certificate;
pub mod client;
pub mod factory;
pub mod prompt;
pub mod request;
pub mod resolver;
pub mod store;
pub mod strategy;
pub mod token_cache;

pub use certificate::ClientCertificate;
pub use client::{AuthProvider, HttpAuthProvider};
pub use factory::{ConnectionFactory, ConnectionTarget};
pub use prompt::{InteractiveHost, NonInteractiveHost, TerminalHost};
pub use request::{ConnectionRequest, CredentialPair};
pub use resolver::{CredentialResolver, lookup_keys};
pub use store::{CredentialStore, KeyringStore, MemoryStore};
pub use strategy::{AuthStrategy, DefaultIdentity, StrategyKind};
pub use token_cache::TokenCache;
