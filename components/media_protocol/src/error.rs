use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty command line")]
    Empty,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReplyParseError {
    #[error("empty reply")]
    Empty,

    #[error("unrecognised reply: {0}")]
    Unrecognised(String),
}
