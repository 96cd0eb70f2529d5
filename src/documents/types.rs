//! Document store request and response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Document held by the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    /// Number of indexed chunks.
    pub chunks: usize,
    /// When the server indexed the document (server-formatted).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub added_at: String,
}

/// Knowledge base summary reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseStatus {
    pub documents_count: usize,
    pub total_chunks: usize,
    pub model: String,
    pub embedding_model: String,
    pub conversation_length: usize,
}

/// Body of `GET /rag/documents`, wrapped or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DocumentList {
    Wrapped { documents: Vec<DocumentInfo> },
    Bare(Vec<DocumentInfo>),
}

impl From<DocumentList> for Vec<DocumentInfo> {
    fn from(list: DocumentList) -> Self {
        match list {
            DocumentList::Wrapped { documents } | DocumentList::Bare(documents) => documents,
        }
    }
}

/// Body of upload responses.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadResult {
    #[serde(default = "default_success")]
    pub success: bool,
    pub filename: Option<String>,
    pub chunks: Option<usize>,
    pub error: Option<String>,
}

/// Body of delete/clear acknowledgements.
#[derive(Debug, Deserialize)]
pub(crate) struct Ack {
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

/// Errors from document store operations.
#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("Invalid document store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Document store request failed: {0}")]
    RequestFailed(String),

    #[error("Document store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse document store response: {0}")]
    ParseError(String),

    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Document rejected: {0}")]
    Rejected(String),

    #[error("Document not found: {0}")]
    NotFound(String),
}
