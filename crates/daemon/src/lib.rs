/// meshecho daemon library
///
/// The echo client and the multi-service echo host, built on the
/// overlay network context and RPC transport of `meshecho-core`.

pub mod cli;
pub mod config;
pub mod dial;
pub mod echo;
pub mod host;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ServerConfig};
pub use dial::{dial_service, DialStrategy};
pub use echo::{echo_reply, EchoHandler, GreeterClient, HelloReply, HelloRequest, SAY_HELLO};
pub use host::{
    provision_listener, RpcServe, RunningService, RunningServices, ServeListener, ServiceHost,
};
pub use shutdown::{next_termination, wait_for_termination, ProcessSignal};
