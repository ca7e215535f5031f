use super::{RecvStream, SendStream, StreamError};
use meshecho_common::config::protocol::MAX_MESSAGE_SIZE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Error code sent when a peer violates the framing rules
const FRAME_ERROR_CODE: u32 = 1;

/// Length-prefixed JSON framing over QUIC streams
///
/// Each frame is a 4 byte little-endian length followed by a JSON body.
pub struct FrameCodec;

impl FrameCodec {
    /// Write one frame
    pub async fn write_frame<T: Serialize>(
        send: &mut SendStream,
        value: &T,
    ) -> Result<(), CodecError> {
        let serialized = serde_json::to_vec(value)?;

        if serialized.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::TooLarge(serialized.len()));
        }

        let len = serialized.len() as u32;
        send.write(&len.to_le_bytes()).await?;
        send.write(&serialized).await?;

        debug!("Sent frame ({} bytes)", serialized.len());
        Ok(())
    }

    /// Write one frame and finish the stream
    pub async fn write_final<T: Serialize>(
        mut send: SendStream,
        value: &T,
    ) -> Result<(), CodecError> {
        Self::write_frame(&mut send, value).await?;
        send.finish()?;
        Ok(())
    }

    /// Read one frame
    ///
    /// Returns `None` when the peer finished the stream before a new frame
    /// started.
    pub async fn read_frame<T: DeserializeOwned>(
        recv: &mut RecvStream,
    ) -> Result<Option<T>, CodecError> {
        let mut len_buf = [0u8; 4];
        match recv.read_exact(&mut len_buf).await {
            Ok(()) => {}
            Err(StreamError::FinishedEarly(0)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE {
            recv.stop(FRAME_ERROR_CODE);
            return Err(CodecError::TooLarge(len));
        }

        let mut data = vec![0u8; len];
        recv.read_exact(&mut data).await.map_err(|e| match e {
            StreamError::FinishedEarly(read) => CodecError::Incomplete {
                expected: len,
                actual: read,
            },
            other => other.into(),
        })?;

        let value = serde_json::from_slice(&data)?;

        debug!("Received frame ({} bytes)", len);
        Ok(Some(value))
    }
}

/// Framing errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes")]
    TooLarge(usize),

    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("Invalid frame body: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Endpoint, EndpointConfig};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        text: String,
    }

    #[tokio::test]
    async fn test_frames_cross_a_stream() {
        let server = Endpoint::server(EndpointConfig::default()).await.unwrap();
        let server_addr = server.local_addr();
        let client = Endpoint::client(EndpointConfig::default()).await.unwrap();

        let server_task = tokio::spawn(async move {
            let conn = server.accept().await.unwrap();
            let (_send, mut recv) = conn.accept_bi().await.unwrap();
            let first: Option<Greeting> = FrameCodec::read_frame(&mut recv).await.unwrap();
            let second: Option<Greeting> = FrameCodec::read_frame(&mut recv).await.unwrap();
            let end: Option<Greeting> = FrameCodec::read_frame(&mut recv).await.unwrap();
            (first, second, end)
        });

        let conn = client.connect(server_addr).await.unwrap();
        let (mut send, _recv) = conn.open_bi().await.unwrap();
        FrameCodec::write_frame(&mut send, &Greeting { text: "hello".into() })
            .await
            .unwrap();
        FrameCodec::write_final(send, &Greeting { text: String::new() })
            .await
            .unwrap();

        let (first, second, end) = server_task.await.unwrap();
        assert_eq!(first, Some(Greeting { text: "hello".into() }));
        assert_eq!(second, Some(Greeting { text: String::new() }));
        assert_eq!(end, None);
    }
}
