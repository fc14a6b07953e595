// bases/playback_server/src/connection.rs
use media_protocol::Reply;
use playback_engine::{PlaybackError, PlaybackManager};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, error, info, warn};

/// Longest command line accepted from a gateway, newline included.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// How a connection ended.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The peer went away before sending a full line; nothing was written.
    PeerDisconnected,
    /// A reply was produced (and written, unless the peer was already gone).
    Replied(Reply),
}

enum Incoming {
    Line(String),
    Disconnected,
    TooLong,
    TimedOut,
    NotUtf8(std::string::FromUtf8Error),
}

/// Serves one connection: read a line, start playback, answer, close.
pub struct ConnectionHandler {
    manager: Arc<PlaybackManager>,
    media_path: PathBuf,
    read_timeout: Option<Duration>,
}

impl ConnectionHandler {
    pub fn new(
        manager: Arc<PlaybackManager>,
        media_path: PathBuf,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            manager,
            media_path,
            read_timeout,
        }
    }

    pub async fn handle<S>(&self, stream: S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(stream);

        let reply = match self.read_command(&mut reader).await {
            Incoming::Line(line) => self.dispatch(&line).await,
            Incoming::Disconnected => {
                debug!("Peer disconnected before sending a command");
                return Outcome::PeerDisconnected;
            }
            Incoming::TooLong => {
                Reply::failed(format!("command line exceeds {MAX_LINE_BYTES} bytes"))
            }
            Incoming::TimedOut => Reply::failed("timed out waiting for a command"),
            Incoming::NotUtf8(e) => {
                warn!("Rejected command: {}", e);
                Reply::failed(format!("received parameters are not valid JSON ({e})"))
            }
        };

        respond(reader.into_inner(), &reply).await;
        Outcome::Replied(reply)
    }

    async fn read_command<R>(&self, reader: &mut R) -> Incoming
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        let read = async {
            let n = (&mut *reader)
                .take(MAX_LINE_BYTES)
                .read_until(b'\n', &mut line)
                .await?;
            // A full buffer without a newline is only too long if more follows
            let too_long = n as u64 >= MAX_LINE_BYTES
                && !line.ends_with(b"\n")
                && !reader.fill_buf().await?.is_empty();
            Ok::<_, io::Error>(too_long)
        };

        let result = match self.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(result) => result,
                Err(_) => return Incoming::TimedOut,
            },
            None => read.await,
        };

        match result {
            Ok(_) if line.ends_with(b"\n") => match String::from_utf8(line) {
                Ok(line) => Incoming::Line(line),
                Err(e) => Incoming::NotUtf8(e),
            },
            Ok(true) => Incoming::TooLong,
            Ok(_) => Incoming::Disconnected,
            Err(e) => {
                debug!("Connection failed while reading: {}", e);
                Incoming::Disconnected
            }
        }
    }

    async fn dispatch(&self, line: &str) -> Reply {
        let command = match media_protocol::decode(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Rejected command: {}", e);
                return Reply::failed(format!("received parameters are not valid JSON ({e})"));
            }
        };

        info!(
            "Received {:?} command with params {:?}",
            command.kind, command.raw_params
        );

        match self.manager.start(&self.media_path).await {
            Ok(now_playing) => Reply::Started(now_playing.path),
            Err(e @ (PlaybackError::TrackNotFound(_) | PlaybackError::NotAFile(_))) => {
                warn!("Cannot play: {}", e);
                Reply::failed(e.to_string())
            }
            Err(e) => {
                error!("Playback failed: {}", e);
                Reply::failed(format!("internal server error: {e}"))
            }
        }
    }
}

async fn respond<S>(mut stream: S, reply: &Reply)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = write_reply(&mut stream, reply).await {
        warn!("Failed to send reply: {}", e);
    }
}

async fn write_reply<S>(stream: &mut S, reply: &Reply) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(reply.to_line().as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}
