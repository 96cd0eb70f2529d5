//! HTTP client for the document store endpoints.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::transport::build_http_client;

use super::{Ack, DocumentError, DocumentInfo, DocumentList, KnowledgeBaseStatus, UploadResult};

const UPLOAD_PATH: &str = "rag/upload";
const DOCUMENTS_PATH: &str = "rag/documents";
const CLEAR_PATH: &str = "rag/clear";
const STATUS_PATH: &str = "rag/status";

/// Client for uploading, listing and deleting grounding documents.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    client: Client,
    config: ClientConfig,
}

impl DocumentClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidUrl` if the base URL is invalid, or
    /// `DocumentError::RequestFailed` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, DocumentError> {
        config.endpoint(DOCUMENTS_PATH)?;
        let client = build_http_client(config.connect_timeout())
            .map_err(|e| DocumentError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, DocumentError> {
        Ok(self.config.endpoint(path)?)
    }

    /// URL of one document, with the filename encoded as a single segment.
    fn document_url(&self, filename: &str) -> Result<Url, DocumentError> {
        let mut url = self.url(DOCUMENTS_PATH)?;
        url.path_segments_mut()
            .map_err(|()| {
                DocumentError::RequestFailed(format!("cannot append a path to {}", self.config.base_url))
            })?
            .push(filename);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, DocumentError> {
        let response = request
            .send()
            .await
            .map_err(|e| DocumentError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DocumentError::ParseError(e.to_string()))
    }

    /// Upload a file to be indexed.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::ReadError` if the file cannot be read,
    /// `DocumentError::Rejected` if the server refuses the document, or a
    /// request/status/parse error.
    pub async fn upload(&self, path: &Path) -> Result<DocumentInfo, DocumentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocumentError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
        let filename = path
            .file_name()
            .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned());

        tracing::info!(file = %filename, bytes = bytes.len(), "Uploading document");
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.clone()));
        let result: UploadResult =
            Self::send_json(self.client.post(self.url(UPLOAD_PATH)?).multipart(form)).await?;

        if !result.success {
            return Err(DocumentError::Rejected(
                result.error.unwrap_or_else(|| "upload failed".to_string()),
            ));
        }
        Ok(DocumentInfo {
            filename: result.filename.unwrap_or(filename),
            chunks: result.chunks.unwrap_or_default(),
            added_at: String::new(),
        })
    }

    /// List indexed documents.
    ///
    /// # Errors
    ///
    /// Returns a request, status or parse error.
    pub async fn list(&self) -> Result<Vec<DocumentInfo>, DocumentError> {
        let list: DocumentList = Self::send_json(self.client.get(self.url(DOCUMENTS_PATH)?)).await?;
        Ok(list.into())
    }

    /// Remove one document from the knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::NotFound` if the server has no such document,
    /// or a request, status or parse error.
    pub async fn delete(&self, filename: &str) -> Result<(), DocumentError> {
        let ack: Ack = Self::send_json(self.client.delete(self.document_url(filename)?)).await?;
        if ack.success {
            tracing::info!(file = %filename, "Deleted document");
            Ok(())
        } else {
            Err(DocumentError::NotFound(filename.to_string()))
        }
    }

    /// Remove every document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Rejected` if the server refuses, or a
    /// request, status or parse error.
    pub async fn clear(&self) -> Result<(), DocumentError> {
        let ack: Ack = Self::send_json(self.client.post(self.url(CLEAR_PATH)?)).await?;
        if ack.success {
            tracing::info!("Cleared knowledge base");
            Ok(())
        } else {
            Err(DocumentError::Rejected("clear refused".to_string()))
        }
    }

    /// Knowledge base summary.
    ///
    /// # Errors
    ///
    /// Returns a request, status or parse error.
    pub async fn status(&self) -> Result<KnowledgeBaseStatus, DocumentError> {
        Self::send_json(self.client.get(self.url(STATUS_PATH)?)).await
    }
}
