use crate::error::PlaybackError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};

/// Starts a child process that plays one media file.
pub trait Launcher: Send + Sync {
    fn launch(&self, path: &Path) -> Result<Child, PlaybackError>;
}

impl<L: Launcher + ?Sized> Launcher for Arc<L> {
    fn launch(&self, path: &Path) -> Result<Child, PlaybackError> {
        (**self).launch(path)
    }
}

/// An external player invoked as `<program> <args...> <path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl PlayerCommand {
    pub const DEFAULT_PROGRAM: &'static str = "ffplay";
    pub const DEFAULT_ARGS: [&'static str; 4] = ["-nodisp", "-autoexit", "-loglevel", "quiet"];

    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Headless `ffplay` that exits when the file ends.
    pub fn ffplay() -> Self {
        Self::new(Self::DEFAULT_PROGRAM, Self::DEFAULT_ARGS)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Find the player executable, searching `PATH` for bare names.
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }
}

impl Default for PlayerCommand {
    fn default() -> Self {
        Self::ffplay()
    }
}

impl Launcher for PlayerCommand {
    fn launch(&self, path: &Path) -> Result<Child, PlaybackError> {
        tracing::debug!(
            "Launching {} {:?} {}",
            self.program.display(),
            self.args,
            path.display()
        );

        Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::spawn(self.program.display().to_string(), e))
    }
}
