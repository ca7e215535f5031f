use quinn::{RecvStream as QuinnRecvStream, SendStream as QuinnSendStream};

/// A send stream for writing data
#[derive(Debug)]
pub struct SendStream {
    inner: QuinnSendStream,
}

impl SendStream {
    pub(crate) fn new(inner: QuinnSendStream) -> Self {
        Self { inner }
    }

    /// Write data to the stream
    pub async fn write(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.inner
            .write_all(data)
            .await
            .map_err(|e| StreamError::Write(e.to_string()))?;

        Ok(())
    }

    /// Finish the stream (close for writing)
    pub fn finish(mut self) -> Result<(), StreamError> {
        self.inner
            .finish()
            .map_err(|e| StreamError::Finish(e.to_string()))?;

        Ok(())
    }
}

/// A receive stream for reading data
#[derive(Debug)]
pub struct RecvStream {
    inner: QuinnRecvStream,
}

impl RecvStream {
    pub(crate) fn new(inner: QuinnRecvStream) -> Self {
        Self { inner }
    }

    /// Read exact amount of data
    ///
    /// A stream finished by the peer before `buf` is filled yields
    /// `StreamError::FinishedEarly` with the number of bytes read.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        self.inner.read_exact(buf).await.map_err(|e| match e {
            quinn::ReadExactError::FinishedEarly(read) => StreamError::FinishedEarly(read),
            quinn::ReadExactError::ReadError(e) => StreamError::Read(e.to_string()),
        })
    }

    /// Stop reading from the stream with an error code
    pub fn stop(&mut self, error_code: u32) {
        let _ = self.inner.stop(error_code.into());
    }
}

/// Stream errors
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Write error: {0}")]
    Write(String),

    #[error("Read error: {0}")]
    Read(String),

    #[error("Stream finished after {0} bytes")]
    FinishedEarly(usize),

    #[error("Finish error: {0}")]
    Finish(String),
}
