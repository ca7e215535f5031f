mod identity;
mod keypair;
mod node_id;

pub use identity::{CurrentIdentity, Identity};
pub use keypair::{KeyPair, KeyPairError, PublicKey};
pub use node_id::{NodeId, NodeIdError};
