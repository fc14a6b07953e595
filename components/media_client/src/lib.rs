mod error;

pub use error::ClientError;
pub use media_protocol::{Command, Reply};

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Gateway-side client for the remote playback service.
///
/// Every request opens a fresh connection, writes one JSON line and reads
/// the reply until the server closes the connection.
#[derive(Debug, Clone)]
pub struct MediaClient {
    addr: String,
    timeout: Duration,
}

impl MediaClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the service to play. Returns the path the remote device resolved.
    pub async fn play(&self, params: Map<String, Value>) -> Result<PathBuf, ClientError> {
        let line = Command::play(params).to_line();
        self.send_line(&line).await
    }

    /// Send an arbitrary request line as-is, appending a newline if missing.
    pub async fn send_line(&self, line: &str) -> Result<PathBuf, ClientError> {
        match self.exchange(line).await? {
            Reply::Started(path) => Ok(path),
            Reply::Failed(reason) => Err(ClientError::Command(reason)),
        }
    }

    async fn exchange(&self, line: &str) -> Result<Reply, ClientError> {
        let text = tokio::time::timeout(self.timeout, self.round_trip(line))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        tracing::debug!("Reply from {}: {}", self.addr, text.trim_end());
        Reply::parse(&text).map_err(|e| ClientError::Protocol(e.to_string()))
    }

    async fn round_trip(&self, line: &str) -> Result<String, ClientError> {
        let mut stream = TcpStream::connect(&self.addr).await?;

        stream.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            stream.write_all(b"\n").await?;
        }
        stream.flush().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;

        String::from_utf8(reply).map_err(|e| ClientError::Protocol(e.to_string()))
    }
}
