mod error;
mod protocol;
mod reply;

pub use error::{DecodeError, ReplyParseError};
pub use protocol::{decode, Command, CommandKind};
pub use reply::Reply;
