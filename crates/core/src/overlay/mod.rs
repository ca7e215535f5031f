/// Overlay network context
///
/// Identity-authenticated dial and listen primitives on top of QUIC:
/// - Listeners publish signed terminators in the shared service directory
/// - Dialers resolve a service (optionally by hosting identity) and
///   authenticate with a signed handshake

mod connection;
mod context;
mod error;
mod handshake;
mod listener;
mod options;

pub use connection::OverlayConnection;
pub use context::{NetworkContext, OverlayContext};
pub use error::NetworkError;
pub use listener::OverlayListener;
pub use options::{DialOptions, ListenOptions};
