//! Long-lived ingestion socket

use super::TransportError;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Unbuffered write-only TCP connection, opened once per adapter.
///
/// The ingestion protocols spoken over it never acknowledge writes, so a
/// failure is only visible as a socket error at write time. Writes are not
/// retried.
pub struct IngestStream {
    stream: Option<TcpStream>,
    peer: String,
}

impl IngestStream {
    /// Connect to `addr` (`host:port`)
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Io {
                target: addr.to_string(),
                message: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        tracing::debug!("Ingestion connection to {} established", addr);

        Ok(Self {
            stream: Some(stream),
            peer: addr.to_string(),
        })
    }

    /// Remote address this stream writes to
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether `close` has not been called yet
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write one complete frame
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(frame).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shut down the write half and drop the connection. Closing twice is a
    /// no-op.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            tracing::debug!("Ingestion connection to {} closed", self.peer);
        }
        Ok(())
    }
}
