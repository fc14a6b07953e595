use crate::config::Config;
use crate::connection::ConnectionHandler;
use crate::error::ServerError;
use playback_engine::PlaybackManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument};

/// Pause after a failed `accept` so a persistent error cannot spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    handler: Arc<ConnectionHandler>,
    manager: Arc<PlaybackManager>,
    drain_timeout: Duration,
}

impl Server {
    pub async fn bind(config: &Config, manager: Arc<PlaybackManager>) -> Result<Self, ServerError> {
        let addr = config.listen_addr();
        let resolved = tokio::net::lookup_host(&addr)
            .await
            .map_err(|source| ServerError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ServerError::NoAddress(addr.clone()))?;

        let listener = listen(resolved, config.backlog).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let handler = ConnectionHandler::new(
            Arc::clone(&manager),
            config.media_path.clone(),
            config.read_timeout,
        );

        Ok(Self {
            listener,
            handler: Arc::new(handler),
            manager,
            drain_timeout: config.stop_grace,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled, then stop playback.
    pub async fn run(self, shutdown: CancellationToken) {
        let Server {
            listener,
            handler,
            manager,
            drain_timeout,
        } = self;
        let connections = TaskTracker::new();

        info!("Playback server accepting connections");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        connections.spawn(
                            async move {
                                let outcome = handler.handle(stream).await;
                                tracing::debug!("Connection closed: {:?}", outcome);
                            }
                            .instrument(info_span!("connection", %peer)),
                        );
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        info!("Playback server shutting down");
        drop(listener);

        connections.close();
        if tokio::time::timeout(drain_timeout, connections.wait())
            .await
            .is_err()
        {
            warn!(
                "{} connection(s) still open after {:?}, not waiting for them",
                connections.len(),
                drain_timeout
            );
        }

        manager.shutdown().await;
    }
}

fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use media_client::{ClientError, MediaClient};
    use playback_engine::PlayerCommand;
    use std::path::{Path, PathBuf};
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    fn pid_alive(pid: u32) -> bool {
        std::process::Command::new("sh")
            .args(["-c", &format!("kill -0 {pid} 2>/dev/null")])
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn test_config(media_path: &Path) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            backlog: 5,
            media_path: media_path.to_path_buf(),
            player: PlayerCommand::new("sh", ["-c", "exec sleep 30", "player"]),
            stop_grace: Duration::from_secs(2),
            read_timeout: None,
        }
    }

    struct Running {
        addr: SocketAddr,
        manager: Arc<PlaybackManager>,
        shutdown: CancellationToken,
        task: JoinHandle<()>,
    }

    impl Running {
        async fn start(config: Config) -> Self {
            let manager = Arc::new(PlaybackManager::new(
                config.player.clone(),
                config.stop_grace,
            ));
            let server = Server::bind(&config, Arc::clone(&manager)).await.unwrap();
            let addr = server.local_addr().unwrap();
            let shutdown = CancellationToken::new();
            let task = tokio::spawn(server.run(shutdown.clone()));

            Self {
                addr,
                manager,
                shutdown,
                task,
            }
        }

        fn client(&self) -> MediaClient {
            MediaClient::new(self.addr.to_string())
        }

        async fn raw(&self, request: &[u8]) -> String {
            let mut stream = TcpStream::connect(self.addr).await.unwrap();
            stream.write_all(request).await.unwrap();
            let mut reply = String::new();
            stream.read_to_string(&mut reply).await.unwrap();
            reply
        }

        async fn stop(self) {
            self.shutdown.cancel();
            self.task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn new_command_replaces_the_running_player() {
        let media = NamedTempFile::new().unwrap();
        let server = Running::start(test_config(media.path())).await;
        let resolved = std::fs::canonicalize(media.path()).unwrap();

        let reply = server.raw(b"{\"foo\":1}\n").await;
        assert_eq!(
            reply,
            format!("Success: remote device started playing {}\n", resolved.display())
        );
        let first = server.manager.now_playing().unwrap();

        // The first connection is already closed; a second one supersedes it
        let path = server.client().play(Default::default()).await.unwrap();
        assert_eq!(path, resolved);

        let second = server.manager.now_playing().unwrap();
        assert_ne!(first.id, second.id);
        assert!(!pid_alive(first.pid.unwrap()));
        assert!(pid_alive(second.pid.unwrap()));

        server.stop().await;
        assert!(!pid_alive(second.pid.unwrap()));
    }

    #[tokio::test]
    async fn missing_media_gets_an_error_line() {
        let config = test_config(Path::new("/this/file/does/not/exist.mp3"));
        let server = Running::start(config).await;

        let result = server.client().play(Default::default()).await;

        assert!(
            matches!(&result, Err(ClientError::Command(reason)) if reason.contains("not found")),
            "unexpected result {result:?}"
        );
        assert!(server.manager.now_playing().is_none());
        server.stop().await;
    }

    #[tokio::test]
    async fn bad_requests_do_not_disturb_the_service() {
        let media = NamedTempFile::new().unwrap();
        let server = Running::start(test_config(media.path())).await;

        // Connect and leave without a word
        drop(TcpStream::connect(server.addr).await.unwrap());
        let reply = server.raw(b"not json\n").await;
        assert!(reply.starts_with("Error: "), "{reply:?}");
        assert!(server.manager.now_playing().is_none());

        let path = server.client().play(Default::default()).await.unwrap();
        assert_eq!(path, std::fs::canonicalize(media.path()).unwrap());

        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_clients_leave_one_player() {
        let media = NamedTempFile::new().unwrap();
        let server = Running::start(test_config(media.path())).await;

        let mut requests = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let client = server.client();
            requests.spawn(async move { client.play(Default::default()).await });
        }
        let mut replies: Vec<PathBuf> = Vec::new();
        while let Some(result) = requests.join_next().await {
            replies.push(result.unwrap().unwrap());
        }

        assert_eq!(replies.len(), 6);
        let current = server.manager.now_playing().unwrap();
        assert!(pid_alive(current.pid.unwrap()));
        // Ids are handed out sequentially, so six starts end on id 6
        assert_eq!(current.id, 6);

        server.stop().await;
    }

    #[tokio::test]
    async fn shutdown_stops_playback_and_the_listener() {
        let media = NamedTempFile::new().unwrap();
        let server = Running::start(test_config(media.path())).await;
        server.client().play(Default::default()).await.unwrap();
        let pid = server.manager.now_playing().unwrap().pid.unwrap();
        let addr = server.addr;
        let manager = Arc::clone(&server.manager);

        server.stop().await;

        assert!(!pid_alive(pid));
        assert!(!manager.is_playing());
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn port_in_use_fails_to_bind() {
        let media = NamedTempFile::new().unwrap();
        let first = Running::start(test_config(media.path())).await;

        let mut config = test_config(media.path());
        config.port = first.addr.port();
        let manager = Arc::new(PlaybackManager::new(config.player.clone(), config.stop_grace));

        assert!(matches!(
            Server::bind(&config, manager).await,
            Err(ServerError::Bind { .. })
        ));
        first.stop().await;
    }
}
