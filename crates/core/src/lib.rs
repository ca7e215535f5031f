pub mod directory;
pub mod identity;
pub mod overlay;
pub mod rpc;
pub mod transport;

pub use directory::{DirectoryError, IdentityRecord, ServiceDirectory, Terminator};
pub use identity::{
    CurrentIdentity, Identity, KeyPair, KeyPairError, NodeId, NodeIdError, PublicKey,
};

// Re-export overlay types
pub use overlay::{
    DialOptions, ListenOptions, NetworkContext, NetworkError, OverlayConnection, OverlayContext,
    OverlayListener,
};

// Re-export RPC types
pub use rpc::{
    RpcClient, RpcClientError, RpcError, RpcRequest, RpcResponse, RpcServer, RpcService,
};
