//! Transport reader for the streaming chat endpoint.
//!
//! A [`Transport`] turns one [`ChatRequest`] into a lazy stream of raw byte
//! chunks. Dropping the stream closes the underlying connection.

mod error;
mod http;
mod request;
mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

pub use error::*;
pub use http::*;
pub use request::*;
pub use scripted::*;

/// Ordered, finite stream of non-empty byte chunks from one open request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens chat requests and exposes the response body as byte chunks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a streaming chat request.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Status` if the server answers with a
    /// non-success status, or `TransportError::Connection` if no response
    /// could be obtained.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}
