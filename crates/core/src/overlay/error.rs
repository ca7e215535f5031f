use crate::directory::DirectoryError;
use crate::transport::{CodecError, ConnectionError, EndpointError};
use meshecho_common::ConfigError;

/// Errors surfaced by the overlay network context
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Not authenticated; call authenticate() first")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("No live terminator for service {0:?}")]
    NoTerminator(String),

    #[error("Identity {identity:?} does not host an addressable terminator for {service:?}")]
    IdentityNotHosting { service: String, identity: String },

    #[error("Connecting to {service:?} timed out after {timeout_ms} ms")]
    Timeout { service: String, timeout_ms: u128 },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connection rejected by listener: {0}")]
    Rejected(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
