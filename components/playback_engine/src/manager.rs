use crate::error::PlaybackError;
use crate::launcher::Launcher;
use crate::process;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of the player that is currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Instance id, unique for the lifetime of the manager.
    pub id: u64,
    pub pid: Option<u32>,
    pub path: PathBuf,
}

/// Bookkeeping for the live child. The child itself is owned by its
/// supervisor task; the handle only holds the means to stop it.
struct PlaybackHandle {
    id: u64,
    pid: Option<u32>,
    path: PathBuf,
    stop: oneshot::Sender<()>,
    supervisor: JoinHandle<()>,
}

impl PlaybackHandle {
    fn snapshot(&self) -> NowPlaying {
        NowPlaying {
            id: self.id,
            pid: self.pid,
            path: self.path.clone(),
        }
    }

    fn is_live(&self) -> bool {
        !self.supervisor.is_finished()
    }

    /// Stop the child and wait until it has been reaped.
    async fn terminate(self) {
        let PlaybackHandle {
            id,
            stop,
            supervisor,
            ..
        } = self;

        // A closed channel means the supervisor already saw the child exit
        let _ = stop.send(());
        if let Err(e) = supervisor.await {
            warn!("Supervisor for player {} failed: {}", id, e);
        }
    }
}

/// The process-wide playback state.
///
/// `guard` serializes whole start/stop operations and is held across the
/// wait for the old child. `current` is only ever locked for short,
/// non-async sections so supervisors can clear it without waiting for an
/// operation in flight.
#[derive(Default)]
struct ServiceState {
    guard: tokio::sync::Mutex<()>,
    current: parking_lot::Mutex<Option<PlaybackHandle>>,
    closed: AtomicBool,
}

impl ServiceState {
    /// Drop the handle for `id` if it is still the current one.
    fn clear_if_current(&self, id: u64) -> bool {
        let finished = {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|handle| handle.id == id) {
                current.take()
            } else {
                None
            }
        };
        finished.is_some()
    }
}

pub struct PlaybackManager {
    state: Arc<ServiceState>,
    launcher: Box<dyn Launcher>,
    stop_grace: Duration,
    next_id: AtomicU64,
}

impl PlaybackManager {
    pub fn new(launcher: impl Launcher + 'static, stop_grace: Duration) -> Self {
        Self {
            state: Arc::new(ServiceState::default()),
            launcher: Box::new(launcher),
            stop_grace,
            next_id: AtomicU64::new(1),
        }
    }

    /// Replace whatever is playing with a player for `path`.
    ///
    /// Returns as soon as the new child has been spawned. The previous child,
    /// if any, has been reaped by then.
    pub async fn start(&self, path: impl AsRef<Path>) -> Result<NowPlaying, PlaybackError> {
        let path = resolve(path.as_ref()).await?;

        let _guard = self.state.guard.lock().await;
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(PlaybackError::ShuttingDown);
        }

        self.stop_current().await;

        let child = self.launcher.launch(&path)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        let (stop, stop_rx) = oneshot::channel();

        // Hold the slot while the supervisor is spawned so that a child which
        // exits immediately cannot miss its own handle.
        let now_playing = {
            let mut current = self.state.current.lock();
            let supervisor = tokio::spawn(supervise(
                Arc::downgrade(&self.state),
                id,
                path.clone(),
                child,
                stop_rx,
                self.stop_grace,
            ));
            let handle = PlaybackHandle {
                id,
                pid,
                path,
                stop,
                supervisor,
            };
            let now_playing = handle.snapshot();
            *current = Some(handle);
            now_playing
        };

        info!(
            "Started player {} (pid {:?}) for {}",
            id,
            pid,
            now_playing.path.display()
        );
        Ok(now_playing)
    }

    /// Stop the current player, if there is one.
    pub async fn stop(&self) -> Result<(), PlaybackError> {
        let _guard = self.state.guard.lock().await;
        self.stop_current().await;
        Ok(())
    }

    /// Stop the current player and refuse any further `start`.
    pub async fn shutdown(&self) {
        let _guard = self.state.guard.lock().await;
        self.state.closed.store(true, Ordering::SeqCst);
        self.stop_current().await;
        info!("Playback manager shut down");
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.state
            .current
            .lock()
            .as_ref()
            .filter(|handle| handle.is_live())
            .map(PlaybackHandle::snapshot)
    }

    pub fn is_playing(&self) -> bool {
        self.now_playing().is_some()
    }

    /// Must be called with `guard` held.
    async fn stop_current(&self) {
        let handle = self.state.current.lock().take();
        if let Some(handle) = handle {
            info!("Stopping player {} for {}", handle.id, handle.path.display());
            handle.terminate().await;
        }
    }
}

async fn resolve(path: &Path) -> Result<PathBuf, PlaybackError> {
    let resolved = match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PlaybackError::TrackNotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(PlaybackError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|source| PlaybackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if !metadata.is_file() {
        return Err(PlaybackError::NotAFile(resolved));
    }

    Ok(resolved)
}

/// Owns `child` until it exits or is told to stop.
///
/// Only a weak reference to the state is kept: the state owns the handle that
/// owns `stop`, so dropping the manager drops the sender and stops the child.
async fn supervise(
    state: Weak<ServiceState>,
    id: u64,
    path: PathBuf,
    mut child: Child,
    stop: oneshot::Receiver<()>,
    grace: Duration,
) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => info!("Player {} finished {}: {}", id, path.display(), status),
                Err(e) => warn!("Lost track of player {}: {}", id, e),
            }
            if state.upgrade().is_some_and(|state| state.clear_if_current(id)) {
                debug!("Cleared handle for player {}", id);
            }
        }
        // Also fires when the handle is dropped with the manager
        _ = stop => {
            match process::terminate(&mut child, grace).await {
                Ok(termination) => info!("Player {} {}", id, termination),
                Err(e) => warn!("Failed to terminate player {}: {}", id, e),
            }
        }
    }
}
