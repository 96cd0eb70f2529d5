//! Session error types.

use crate::protocol::DecodeError;
use crate::transport::TransportError;

/// Errors reported by a chat session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `send` while a response is still streaming.
    #[error("A response is already streaming")]
    Conflict,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Stream was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// Driver task ended abnormally.
    #[error("Stream task aborted: {0}")]
    Aborted(String),
}

impl SessionError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
