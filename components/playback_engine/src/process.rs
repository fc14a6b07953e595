use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

/// How a player process ended when we asked it to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The process had already exited before the stop request.
    AlreadyExited(ExitStatus),
    /// The process exited within the grace period.
    Exited(ExitStatus),
    /// The grace period ran out and the process was killed.
    Killed(ExitStatus),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::AlreadyExited(status) => write!(f, "already exited ({status})"),
            Termination::Exited(status) => write!(f, "exited ({status})"),
            Termination::Killed(status) => write!(f, "killed after grace period ({status})"),
        }
    }
}

/// Ask `child` to exit, then kill it if it is still running after `grace`.
///
/// The child has been reaped when this returns, unless the final kill or
/// wait itself fails.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> io::Result<Termination> {
    match child.try_wait() {
        Ok(Some(status)) => return Ok(Termination::AlreadyExited(status)),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Could not poll player {:?}: {}", child.id(), e);
            return kill_and_reap(child).await.map(Termination::Killed);
        }
    }

    if let Err(e) = request_exit(child) {
        tracing::warn!("Could not signal player {:?}: {}", child.id(), e);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Ok(Termination::Exited(status)),
        Ok(Err(e)) => {
            tracing::warn!("Lost track of player {:?}: {}", child.id(), e);
            kill_and_reap(child).await.map(Termination::Killed)
        }
        Err(_) => {
            tracing::warn!(
                "Player {:?} ignored stop request for {:?}, killing it",
                child.id(),
                grace
            );
            kill_and_reap(child).await.map(Termination::Killed)
        }
    }
}

/// Kill `child` and wait for it. A failed kill still waits, since the
/// process may already be gone.
async fn kill_and_reap(child: &mut Child) -> io::Result<ExitStatus> {
    let killed = child.start_kill();
    child.wait().await.map_err(|e| killed.err().unwrap_or(e))
}

#[cfg(unix)]
fn request_exit(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    // SAFETY: `pid` is our own child and has not been reaped yet, so it
    // cannot refer to an unrelated process.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
