use super::{RpcError, RpcRequest, RpcResponse};
use crate::overlay::{NetworkError, OverlayConnection, OverlayListener};
use crate::transport::{CodecError, FrameCodec, RecvStream, SendStream};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A set of RPC methods
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// Server side of the RPC transport
pub struct RpcServer;

impl RpcServer {
    /// Serve `service` on every connection of `listener`
    ///
    /// Runs until the listener is closed. Each connection and each request
    /// stream is handled on its own task.
    pub async fn serve<S>(
        mut listener: OverlayListener,
        service: Arc<S>,
    ) -> Result<(), NetworkError>
    where
        S: RpcService + ?Sized,
    {
        info!(
            "Serving RPC for {} on {}",
            listener.service(),
            listener.local_addr()
        );

        while let Some(connection) = listener.accept().await? {
            tokio::spawn(serve_connection(connection, service.clone()));
        }

        info!("Listener for {} closed", listener.service());
        Ok(())
    }
}

async fn serve_connection<S>(connection: OverlayConnection, service: Arc<S>)
where
    S: RpcService + ?Sized,
{
    debug!(
        "Serving {} for {}",
        connection.service(),
        connection.peer_identity().name()
    );

    loop {
        let (send, recv) = match connection.accept_bi().await {
            Ok(streams) => streams,
            Err(e) => {
                debug!(
                    "Connection from {} ended: {}",
                    connection.peer_identity().name(),
                    e
                );
                break;
            }
        };

        let service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_request(send, recv, service.as_ref()).await {
                warn!("Failed to handle request: {}", e);
            }
        });
    }
}

async fn handle_request<S>(
    send: SendStream,
    mut recv: RecvStream,
    service: &S,
) -> Result<(), CodecError>
where
    S: RpcService + ?Sized,
{
    let request: RpcRequest = match FrameCodec::read_frame(&mut recv).await? {
        Some(request) => request,
        None => return Ok(()),
    };

    debug!("Handling {} (id {})", request.method, request.id);

    let result = service.call(&request.method, request.params).await;
    if let Err(e) = &result {
        debug!("{} (id {}) failed: {}", request.method, request.id, e);
    }

    FrameCodec::write_final(
        send,
        &RpcResponse {
            id: request.id,
            result,
        },
    )
    .await
}
