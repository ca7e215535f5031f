use super::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A unique identifier for an identity in the overlay
///
/// Derived from the identity's public key using BLAKE3 hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 32]);

impl NodeId {
    /// Create a NodeId from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let hash = blake3::hash(&public_key.as_bytes());
        Self(*hash.as_bytes())
    }

    /// Create a NodeId from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the NodeId
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to a hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from a hexadecimal string
    pub fn from_hex(s: &str) -> Result<Self, NodeIdError> {
        let bytes = hex::decode(s).map_err(|_| NodeIdError::InvalidHex)?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| NodeIdError::InvalidLength)?;
        Ok(Self(array))
    }

    /// Get a shortened display version (first 8 bytes as hex)
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}...)", &self.short_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_hex())
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Errors related to NodeId operations
#[derive(Debug, thiserror::Error)]
pub enum NodeIdError {
    #[error("Invalid hexadecimal string")]
    InvalidHex,

    #[error("Invalid length (expected 32 bytes)")]
    InvalidLength,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KeyPair;

    #[test]
    fn test_node_id_deterministic() {
        let keypair = KeyPair::generate();
        let public_key = keypair.public_key();

        let node_id1 = NodeId::from_public_key(&public_key);
        let node_id2 = NodeId::from_public_key(&public_key);

        assert_eq!(node_id1, node_id2);
    }

    #[test]
    fn test_node_id_hex() {
        let keypair = KeyPair::generate();
        let node_id = NodeId::from_public_key(&keypair.public_key());

        let hex = node_id.to_hex();
        let restored = NodeId::from_hex(&hex).unwrap();

        assert_eq!(node_id, restored);
        assert!(matches!(NodeId::from_hex("abcd"), Err(NodeIdError::InvalidLength)));
        assert!(matches!(NodeId::from_hex("xyz"), Err(NodeIdError::InvalidHex)));
    }

    #[test]
    fn test_short_hex_is_prefix() {
        let node_id = NodeId::from_bytes([0xab; 32]);
        assert_eq!(node_id.short_hex(), "ab".repeat(8));
        assert!(node_id.to_hex().starts_with(&node_id.to_string()));
    }

    #[test]
    fn test_serialization() {
        let keypair = KeyPair::generate();
        let node_id = NodeId::from_public_key(&keypair.public_key());

        let json = serde_json::to_string(&node_id).unwrap();
        assert_eq!(json, format!("\"{}\"", node_id.to_hex()));

        let deserialized: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(node_id, deserialized);
    }
}
