use crate::error::ConfigError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network protocol constants
pub mod protocol {
    /// Current handshake protocol version
    pub const VERSION: u32 = 1;

    /// Connect timeout used when dialing a service without a target identity
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Connect timeout used when dialing a specific hosting identity
    pub const IDENTITY_DIAL_TIMEOUT_SECS: u64 = 60;

    /// Connect timeout for listeners bound in addressable mode
    pub const ADDRESSABLE_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Maximum concurrent connections for listeners bound in addressable mode
    pub const ADDRESSABLE_MAX_CONNECTIONS: usize = 10;

    /// Maximum concurrent connections for default listeners
    pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

    /// Maximum frame size (10 MB)
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// Accepted clock skew between handshake peers
    pub const HANDSHAKE_MAX_SKEW_SECS: u64 = 300;

    /// Idle timeout of QUIC connections
    pub const IDLE_TIMEOUT_SECS: u64 = 60;

    /// Keep-alive interval of QUIC connections
    pub const KEEPALIVE_INTERVAL_SECS: u64 = 5;
}

/// Service directory constants
pub mod overlay {
    /// A terminator not refreshed within this window is considered gone
    pub const TERMINATOR_TTL_SECS: u64 = 30;

    /// How often a live listener refreshes its terminator
    pub const TERMINATOR_REFRESH_SECS: u64 = 10;
}

/// RPC constants
pub mod rpc {
    /// Timeout of the client's single greeting call
    pub const CALL_TIMEOUT_MILLIS: u64 = 1000;
}

/// Identity credential file
///
/// Holds everything a process needs to join the overlay: the display
/// name, the ed25519 seed, the shared directory acting as trust root and
/// the host its endpoints bind on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Display name of the identity
    pub name: String,

    /// Hex encoded ed25519 secret key
    pub secret_key: String,

    /// Shared service directory
    pub directory: PathBuf,

    /// Address QUIC endpoints bind on
    #[serde(default = "default_bind_host")]
    pub bind_host: IpAddr,
}

fn default_bind_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

impl IdentityConfig {
    /// Create a configuration with a freshly generated secret key
    pub fn generate(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);

        Self {
            name: name.into(),
            secret_key: hex::encode(secret),
            directory: directory.into(),
            bind_host: default_bind_host(),
        }
    }

    pub fn with_bind_host(mut self, bind_host: IpAddr) -> Self {
        self.bind_host = bind_host;
        self
    }

    /// Decode the secret key
    pub fn secret_bytes(&self) -> Result<[u8; 32], ConfigError> {
        let bytes = hex::decode(self.secret_key.trim())
            .map_err(|e| ConfigError::InvalidSecretKey(e.to_string()))?;
        bytes.try_into().map_err(|bytes: Vec<u8>| {
            ConfigError::InvalidSecretKey(format!("expected 32 bytes, got {}", bytes.len()))
        })
    }

    /// Default location: `$HOME/.meshecho/identities/.identity.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHomeDirectory)?;
        Ok(PathBuf::from(home)
            .join(".meshecho")
            .join("identities")
            .join(".identity.json"))
    }

    /// Load the identity from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        if config.name.trim().is_empty() {
            return Err(ConfigError::ParseError(format!(
                "{}: identity name is empty",
                path.display()
            )));
        }
        config.secret_bytes()?;

        Ok(config)
    }

    /// Save the identity to a JSON file, creating parent directories
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }
        std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }
}

pub fn default_connect_timeout() -> Duration {
    Duration::from_secs(protocol::DEFAULT_CONNECT_TIMEOUT_SECS)
}

pub fn identity_dial_timeout() -> Duration {
    Duration::from_secs(protocol::IDENTITY_DIAL_TIMEOUT_SECS)
}

pub fn call_timeout() -> Duration {
    Duration::from_millis(rpc::CALL_TIMEOUT_MILLIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_has_valid_key() {
        let config = IdentityConfig::generate("alice", "/tmp/directory");
        assert_eq!(config.name, "alice");
        assert_eq!(config.bind_host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.secret_bytes().unwrap().len(), 32);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities").join("alice.json");

        let config = IdentityConfig::generate("alice", dir.path().join("directory"));
        config.to_file(&path).unwrap();

        let loaded = IdentityConfig::from_file(&path).unwrap();
        assert_eq!(loaded.name, config.name);
        assert_eq!(loaded.secret_key, config.secret_key);
        assert_eq!(loaded.directory, config.directory);
    }

    #[test]
    fn test_bind_host_defaults_to_loopback() {
        let json = r#"{"name":"bob","secret_key":"00000000000000000000000000000000000000000000000000000000000000aa","directory":"/srv/dir"}"#;
        let config: IdentityConfig = serde_json::from_str(json).unwrap();
        assert!(config.bind_host.is_loopback());
    }

    #[test]
    fn test_rejects_short_secret_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"name":"bob","secret_key":"abcd","directory":"/srv/dir"}"#,
        )
        .unwrap();

        let err = IdentityConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSecretKey(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = IdentityConfig::from_file(Path::new("/nonexistent/identity.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }
}
