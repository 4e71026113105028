//! GameSpace client library.
//!
//! Wires the session, the gateway, the read cache, and the mutation
//! coordinator into [`GameSpaceClient`], the handle views work through.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mutation;
pub mod persistence;
pub mod resources;
pub mod session;
pub mod transport;
pub mod views;

pub use client::GameSpaceClient;
pub use config::{ClientConfig, ConfigError, LoggingConfig};
pub use error::{ClientError, ClientResult};
pub use gateway::{Attach, CredentialProvider, GatewayClient};
pub use mutation::MutationCoordinator;
pub use persistence::{CredentialStore, FileCredentialStore, MemoryCredentialStore, PersistenceError};
pub use resources::Resource;
pub use session::{Access, Credential, GuardDecision, SessionManager, SessionState};
pub use transport::ReqwestTransport;
