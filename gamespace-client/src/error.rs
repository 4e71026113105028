//! Error types for the client binary and facade construction.

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use gamespace_core::{AuthError, GatewayError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
    #[error("{0}")]
    Usage(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
