use quinn::Connection as QuinnConnection;
use std::net::SocketAddr;

/// A QUIC connection to a remote peer
#[derive(Debug, Clone)]
pub struct Connection {
    /// Quinn connection
    inner: QuinnConnection,
}

impl Connection {
    /// Create a new connection wrapper
    pub(crate) fn new(inner: QuinnConnection) -> Self {
        Self { inner }
    }

    /// Open a bidirectional stream
    pub async fn open_bi(&self) -> Result<(super::SendStream, super::RecvStream), ConnectionError> {
        let (send, recv) = self
            .inner
            .open_bi()
            .await
            .map_err(|e| ConnectionError::StreamOpen(e.to_string()))?;

        Ok((super::SendStream::new(send), super::RecvStream::new(recv)))
    }

    /// Accept an incoming bidirectional stream
    ///
    /// Returns `ConnectionError::Closed` once the peer or the local side
    /// has closed the connection.
    pub async fn accept_bi(
        &self,
    ) -> Result<(super::SendStream, super::RecvStream), ConnectionError> {
        match self.inner.accept_bi().await {
            Ok((send, recv)) => Ok((super::SendStream::new(send), super::RecvStream::new(recv))),
            Err(
                e @ (quinn::ConnectionError::ApplicationClosed(_)
                | quinn::ConnectionError::ConnectionClosed(_)
                | quinn::ConnectionError::LocallyClosed
                | quinn::ConnectionError::TimedOut),
            ) => Err(ConnectionError::Closed(e.to_string())),
            Err(e) => Err(ConnectionError::StreamAccept(e.to_string())),
        }
    }

    /// Get remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    /// Close the connection gracefully
    pub fn close(&self, error_code: u32, reason: &str) {
        self.inner.close(error_code.into(), reason.as_bytes());
    }

    /// Check if connection is closed
    pub fn is_closed(&self) -> bool {
        self.inner.close_reason().is_some()
    }

    /// Wait until the connection is closed by either side
    pub async fn closed(&self) {
        self.inner.closed().await;
    }
}

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to open stream: {0}")]
    StreamOpen(String),

    #[error("Failed to accept stream: {0}")]
    StreamAccept(String),

    #[error("Connection closed: {0}")]
    Closed(String),
}
