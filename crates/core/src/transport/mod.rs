/// Transport layer using QUIC
///
/// Every overlay listener owns its own server endpoint and every dial
/// opens a client endpoint; frames are carried by `FrameCodec`.

mod codec;
mod connection;
mod endpoint;
mod stream;

pub use codec::{CodecError, FrameCodec};
pub use connection::{Connection, ConnectionError};
pub use endpoint::{Endpoint, EndpointConfig, EndpointError};
pub use stream::{RecvStream, SendStream, StreamError};
