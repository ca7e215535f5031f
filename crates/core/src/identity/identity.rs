use super::{KeyPair, NodeId, PublicKey};
use meshecho_common::{ConfigError, IdentityConfig};
use std::fmt;

/// Complete identity of a process in the overlay
///
/// Contains the display name, the keypair and the derived NodeId
#[derive(Clone)]
pub struct Identity {
    name: String,
    keypair: KeyPair,
    node_id: NodeId,
}

impl Identity {
    /// Generate a new random identity
    pub fn generate(name: impl Into<String>) -> Self {
        Self::from_keypair(name, KeyPair::generate())
    }

    /// Create an identity from an existing keypair
    pub fn from_keypair(name: impl Into<String>, keypair: KeyPair) -> Self {
        let node_id = NodeId::from_public_key(&keypair.public_key());
        Self {
            name: name.into(),
            keypair,
            node_id,
        }
    }

    /// Load the identity described by an identity file
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ConfigError> {
        let secret = config.secret_bytes()?;
        Ok(Self::from_keypair(
            config.name.clone(),
            KeyPair::from_secret_bytes(&secret),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Get the node ID
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.keypair.sign(message)
    }

    /// Sign a message, hex encoding the signature
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message))
    }

    /// Verify a signature on a message using this identity's public key
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        self.keypair.verify(message, signature)
    }

    /// The read-only view handed to services
    pub fn to_current(&self) -> CurrentIdentity {
        CurrentIdentity {
            name: self.name.clone(),
            node_id: self.node_id,
            public_key: self.public_key(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("node_id", &self.node_id)
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// The authenticated identity of the running process
///
/// Acquired once after authentication and shared read-only by every
/// hosted service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentIdentity {
    name: String,
    node_id: NodeId,
    public_key: PublicKey,
}

impl CurrentIdentity {
    pub fn new(name: impl Into<String>, node_id: NodeId, public_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            node_id,
            public_key,
        }
    }

    /// Display name of the identity
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}
