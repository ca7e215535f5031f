/// Directory records
///
/// Identity records bind a display name to a public key; terminators
/// announce where a service is currently being hosted and by whom.

use crate::identity::{Identity, NodeId, PublicKey};
use meshecho_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

const TERMINATOR_VERSION: u8 = 1;

/// An enrolled identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub public_key: PublicKey,
    pub node_id: NodeId,
    pub enrolled_at: Timestamp,
}

impl IdentityRecord {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            name: identity.name().to_string(),
            public_key: identity.public_key(),
            node_id: identity.node_id(),
            enrolled_at: Timestamp::now(),
        }
    }

    /// Whether this record was enrolled with the given key
    pub fn matches(&self, public_key: &PublicKey) -> bool {
        self.public_key == *public_key && self.node_id == NodeId::from_public_key(public_key)
    }
}

/// A live listener for a service, published by its hosting identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminator {
    /// Version of the record format
    pub version: u8,

    pub service: String,

    /// Display name of the hosting identity
    pub identity: String,

    pub node_id: NodeId,

    pub public_key: PublicKey,

    /// QUIC address of the listener
    pub address: SocketAddr,

    /// Whether dialers may target this identity explicitly
    pub addressable: bool,

    pub created_at: Timestamp,

    /// Refreshed periodically while the listener is alive
    pub updated_at: Timestamp,

    /// Hex signature of the hosting identity over the record
    pub signature: String,
}

impl Terminator {
    /// Create and sign a terminator for `service`
    pub fn new(service: &str, identity: &Identity, address: SocketAddr, addressable: bool) -> Self {
        let now = Timestamp::now();
        let mut terminator = Self {
            version: TERMINATOR_VERSION,
            service: service.to_string(),
            identity: identity.name().to_string(),
            node_id: identity.node_id(),
            public_key: identity.public_key(),
            address,
            addressable,
            created_at: now,
            updated_at: now,
            signature: String::new(),
        };
        terminator.sign(identity);
        terminator
    }

    /// Mark the terminator alive now and re-sign it
    pub fn refresh(&mut self, identity: &Identity) {
        self.updated_at = Timestamp::now();
        self.sign(identity);
    }

    fn sign(&mut self, identity: &Identity) {
        self.signature = identity.sign_hex(&self.signing_data());
    }

    #[cfg(test)]
    pub(crate) fn resign(&mut self, identity: &Identity) {
        self.sign(identity);
    }

    /// Verify the signature and that the node id matches the key
    pub fn verify(&self) -> bool {
        self.node_id == NodeId::from_public_key(&self.public_key)
            && self
                .public_key
                .verify_hex(&self.signing_data(), &self.signature)
                .is_ok()
    }

    /// Whether the terminator missed its refresh window
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.updated_at.elapsed() > ttl
    }

    fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(self.version);
        data.extend_from_slice(self.service.as_bytes());
        data.push(0);
        data.extend_from_slice(self.identity.as_bytes());
        data.push(0);
        data.extend_from_slice(self.node_id.as_bytes());
        data.extend_from_slice(self.address.to_string().as_bytes());
        data.push(0);
        data.push(self.addressable as u8);
        data.extend_from_slice(&self.created_at.as_secs().to_le_bytes());
        data.extend_from_slice(&self.updated_at.as_secs().to_le_bytes());
        data
    }
}
