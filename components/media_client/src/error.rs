use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No reply within {0:?}")]
    Timeout(std::time::Duration),
}
