use meshecho_common::config::{default_connect_timeout, protocol};
use std::time::Duration;

/// Options for dialing a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    /// Only connect to a terminator hosted by this identity
    pub identity: Option<String>,

    /// Bound on connection establishment (connect + handshake)
    pub connect_timeout: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            identity: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl DialOptions {
    /// Dial the terminator of a specific identity
    pub fn to_identity(identity: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            identity: Some(identity.into()),
            connect_timeout,
        }
    }
}

/// Options for binding a service listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenOptions {
    /// Bound on each inbound handshake
    pub connect_timeout: Duration,

    /// Connections served at once; further dialers wait
    pub max_connections: usize,

    /// Announce the terminator as addressable by the hosting identity
    pub bind_using_identity: bool,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            max_connections: protocol::DEFAULT_MAX_CONNECTIONS,
            bind_using_identity: false,
        }
    }
}

impl ListenOptions {
    /// Options for a listener reachable by identity-targeted dials
    pub fn addressable() -> Self {
        Self {
            connect_timeout: Duration::from_secs(protocol::ADDRESSABLE_CONNECT_TIMEOUT_SECS),
            max_connections: protocol::ADDRESSABLE_MAX_CONNECTIONS,
            bind_using_identity: true,
        }
    }
}
