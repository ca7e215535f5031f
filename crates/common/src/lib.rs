/// Shared types for meshecho: protocol constants, the identity file and
/// hosted service descriptors.

pub mod config;
pub mod error;
pub mod types;

pub use config::IdentityConfig;
pub use error::{ConfigError, DescriptorError};
pub use types::{ServiceDescriptor, Timestamp};
