/// Minimal request/response RPC over overlay connections
///
/// Every call opens a bidirectional stream, sends one `RpcRequest` frame
/// and reads one `RpcResponse` frame. Servers are stateless per request.

mod client;
mod message;
mod server;

pub use client::{RpcClient, RpcClientError};
pub use message::{RpcError, RpcRequest, RpcResponse};
pub use server::{RpcServer, RpcService};
