use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Cannot locate home directory for the default identity file")]
    NoHomeDirectory,
}

/// Errors raised while decoding a hosted service descriptor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("malformed service descriptor {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    #[error("service descriptor {0:?} has an empty name")]
    EmptyName(String),

    #[error("service {0:?} is hosted more than once")]
    Duplicate(String),
}
