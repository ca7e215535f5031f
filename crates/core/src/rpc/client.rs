use super::{RpcError, RpcRequest, RpcResponse};
use crate::identity::CurrentIdentity;
use crate::overlay::{NetworkError, OverlayConnection};
use crate::transport::{CodecError, FrameCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Client side of the RPC transport over one overlay connection
pub struct RpcClient {
    connection: OverlayConnection,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(connection: OverlayConnection) -> Self {
        Self {
            connection,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `method` and wait at most `timeout` for the reply
    pub async fn call<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp, RpcClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let request = RpcRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params: serde_json::to_value(request).map_err(CodecError::from)?,
        };

        let response = tokio::time::timeout(timeout, self.round_trip(&request))
            .await
            .map_err(|_| RpcClientError::Timeout(timeout))??;

        if response.id != request.id {
            return Err(RpcClientError::Decode(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        let value = response.result?;
        serde_json::from_value(value).map_err(|e| RpcClientError::Decode(e.to_string()))
    }

    async fn round_trip(&self, request: &RpcRequest) -> Result<RpcResponse, RpcClientError> {
        let (send, mut recv) = self.connection.open_bi().await?;
        FrameCodec::write_final(send, request).await?;

        debug!("Sent {} (id {})", request.method, request.id);

        FrameCodec::read_frame(&mut recv)
            .await?
            .ok_or_else(|| RpcClientError::Decode("stream finished without a response".into()))
    }

    /// The serving identity on the other end
    pub fn peer_identity(&self) -> &CurrentIdentity {
        self.connection.peer_identity()
    }

    pub fn close(&self) {
        self.connection.close();
    }
}

/// Errors of a client call
#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] NetworkError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote error: {0}")]
    Remote(#[from] RpcError),

    #[error("Invalid response: {0}")]
    Decode(String),
}
