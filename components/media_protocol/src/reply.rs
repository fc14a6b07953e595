use crate::error::ReplyParseError;
use std::fmt;
use std::path::PathBuf;

const SUCCESS_PREFIX: &str = "Success: remote device started playing ";
const ERROR_PREFIX: &str = "Error: ";

/// The single text line the service writes back before closing a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Started(PathBuf),
    Failed(String),
}

impl Reply {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Encode as a wire line, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }

    /// Parse a reply received from the service.
    pub fn parse(text: &str) -> Result<Self, ReplyParseError> {
        let text = text.trim_end_matches(['\n', '\r']);
        if text.is_empty() {
            return Err(ReplyParseError::Empty);
        }

        if let Some(path) = text.strip_prefix(SUCCESS_PREFIX) {
            Ok(Reply::Started(PathBuf::from(path)))
        } else if let Some(reason) = text.strip_prefix(ERROR_PREFIX) {
            Ok(Reply::Failed(reason.to_string()))
        } else {
            Err(ReplyParseError::Unrecognised(text.to_string()))
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Started(path) => write!(f, "{SUCCESS_PREFIX}{}", path.display()),
            Reply::Failed(reason) => write!(f, "{ERROR_PREFIX}{reason}"),
        }
    }
}
