use super::NetworkError;
use crate::identity::CurrentIdentity;
use crate::transport::{Connection, Endpoint, RecvStream, SendStream};
use std::net::SocketAddr;
use tokio::sync::OwnedSemaphorePermit;

/// An authenticated overlay connection
///
/// On the listener side it holds one of the listener's connection slots
/// until dropped; on the dialer side it keeps the client endpoint alive.
pub struct OverlayConnection {
    connection: Connection,
    peer: CurrentIdentity,
    service: String,
    _permit: Option<OwnedSemaphorePermit>,
    _endpoint: Option<Endpoint>,
}

impl OverlayConnection {
    pub(crate) fn accepted(
        connection: Connection,
        peer: CurrentIdentity,
        service: String,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            connection,
            peer,
            service,
            _permit: Some(permit),
            _endpoint: None,
        }
    }

    pub(crate) fn dialed(
        connection: Connection,
        peer: CurrentIdentity,
        service: String,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            connection,
            peer,
            service,
            _permit: None,
            _endpoint: Some(endpoint),
        }
    }

    /// Identity on the other end, as verified by the handshake
    pub fn peer_identity(&self) -> &CurrentIdentity {
        &self.peer
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_addr()
    }

    pub async fn open_bi(&self) -> Result<(SendStream, RecvStream), NetworkError> {
        Ok(self.connection.open_bi().await?)
    }

    /// Accept the next request stream opened by the peer
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), NetworkError> {
        Ok(self.connection.accept_bi().await?)
    }

    pub fn close(&self) {
        self.connection.close(0, "closed");
    }
}

impl std::fmt::Debug for OverlayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayConnection")
            .field("service", &self.service)
            .field("peer", &self.peer.name())
            .field("remote_addr", &self.remote_addr())
            .finish()
    }
}
