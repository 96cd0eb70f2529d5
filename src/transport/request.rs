//! Chat request and non-streaming reply bodies.

use serde::{Deserialize, Serialize};

/// Body of a `POST /rag/chat` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User prompt.
    pub message: String,
    /// Whether the server should ground the answer in uploaded documents.
    pub use_rag: bool,
    stream: bool,
}

impl ChatRequest {
    /// Request a streamed answer.
    #[must_use]
    pub fn streaming(message: impl Into<String>, use_rag: bool) -> Self {
        Self {
            message: message.into(),
            use_rag,
            stream: true,
        }
    }

    /// Request a single complete answer.
    #[must_use]
    pub fn blocking(message: impl Into<String>, use_rag: bool) -> Self {
        Self {
            message: message.into(),
            use_rag,
            stream: false,
        }
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream
    }
}

/// Reply to a non-streaming chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<String>,
}
