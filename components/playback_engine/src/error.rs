use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("media file not found: {}", .0.display())]
    TrackNotFound(PathBuf),

    #[error("media path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to resolve media path {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch player {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("playback service is shutting down")]
    ShuttingDown,
}

impl PlaybackError {
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        PlaybackError::Spawn {
            program: program.into(),
            source,
        }
    }
}
