//! Transport error types.

use std::time::Duration;

/// Errors raised while opening or reading a chat stream.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Server answered with a non-success status before any chunk.
    #[error("HTTP error! status: {status} ({reason})")]
    Status { status: u16, reason: String },

    /// Request could not be sent or no response head arrived.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Body read failed after the stream was opened.
    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    /// No bytes arrived within the idle window.
    #[error("No data received for {}s", .0.as_secs_f64())]
    IdleTimeout(Duration),
}

impl TransportError {
    /// HTTP status code, if the server produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
