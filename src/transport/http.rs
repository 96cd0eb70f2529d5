//! HTTP transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use url::Url;

use crate::config::ClientConfig;
use crate::display::truncate;

use super::{ByteStream, ChatReply, ChatRequest, Transport, TransportError};

/// Chat endpoint, relative to the configured base URL.
pub const CHAT_PATH: &str = "rag/chat";

/// Maximum length of a server error body carried into `TransportError::Status`.
const MAX_REASON_LEN: usize = 200;

/// Build an HTTP client for long-lived streaming responses.
///
/// Only the connect phase is bounded; body reads are bounded by the
/// session's idle timeout instead of an overall request timeout.
pub(crate) fn build_http_client(connect_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().connect_timeout(connect_timeout).build()
}

/// Transport that posts chat requests to the chat endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    chat_url: Url,
}

impl HttpTransport {
    /// Create a transport from an existing client and endpoint.
    #[must_use]
    pub fn new(client: Client, chat_url: Url) -> Self {
        Self { client, chat_url }
    }

    /// Create a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connection` if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let chat_url = config
            .endpoint(CHAT_PATH)
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let client = build_http_client(config.connect_timeout())
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self::new(client, chat_url))
    }

    /// Endpoint this transport posts to.
    #[must_use]
    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    async fn post(&self, request: &ChatRequest) -> Result<Response, TransportError> {
        let response = self
            .client
            .post(self.chat_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(url = %self.chat_url, status = status.as_u16(), "Chat request rejected");
        Err(TransportError::Status {
            status: status.as_u16(),
            reason: failure_reason(status, &body),
        })
    }

    /// Ask for a complete, non-streamed answer.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Status` or `TransportError::Connection` as
    /// [`Transport::open`] does, and `TransportError::Interrupted` if the
    /// reply body cannot be read or parsed.
    pub async fn chat_once(&self, message: &str, use_rag: bool) -> Result<ChatReply, TransportError> {
        let request = ChatRequest::blocking(message, use_rag);
        let response = self.post(&request).await?;
        response
            .json::<ChatReply>()
            .await
            .map_err(|e| TransportError::Interrupted(e.to_string()))
    }
}

/// Reason text for a failed response: the body if any, else the status text.
fn failure_reason(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
    }
    truncate(body, MAX_REASON_LEN, false)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let response = self.post(request).await?;
        tracing::debug!(
            url = %self.chat_url,
            status = response.status().as_u16(),
            "Chat stream opened"
        );

        let chunks = response.bytes_stream().filter_map(|chunk| async move {
            match chunk {
                Ok(bytes) if bytes.is_empty() => None,
                Ok(bytes) => Some(Ok(bytes)),
                Err(e) => Some(Err(TransportError::Interrupted(e.to_string()))),
            }
        });
        Ok(Box::pin(chunks))
    }
}
