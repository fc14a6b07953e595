use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to resolve listen address {addr}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listen address {0} did not resolve to anything")]
    NoAddress(String),

    #[error("failed to listen on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
