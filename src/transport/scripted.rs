//! In-process transport fed by the caller.
//!
//! Each call to [`Transport::open`] consumes the next scripted response in
//! order. A live response is driven through a [`ChunkFeed`]; dropping the
//! feed ends the stream.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{future, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ByteStream, ChatRequest, Transport, TransportError};

type ChunkResult = Result<Bytes, TransportError>;

#[derive(Debug)]
enum Scripted {
    Stream(mpsc::UnboundedReceiver<ChunkResult>),
    Reject(TransportError),
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Scripted>,
    requests: Vec<ChatRequest>,
}

/// Fake transport with scripted responses.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script a live response and return the feed that drives it.
    #[must_use]
    pub fn respond(&self) -> ChunkFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().responses.push_back(Scripted::Stream(rx));
        ChunkFeed { tx }
    }

    /// Script a response that delivers `chunks` and then ends.
    pub fn respond_with<I, B>(&self, chunks: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let feed = self.respond();
        for chunk in chunks {
            feed.chunk(chunk);
        }
    }

    /// Script a response that fails before any chunk is delivered.
    pub fn reject(&self, error: TransportError) {
        self.lock().responses.push_back(Scripted::Reject(error));
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let next = {
            let mut script = self.lock();
            script.requests.push(request.clone());
            script.responses.pop_front()
        };

        match next {
            Some(Scripted::Stream(rx)) => {
                let chunks = UnboundedReceiverStream::new(rx)
                    .filter(|chunk| future::ready(!matches!(chunk, Ok(bytes) if bytes.is_empty())));
                Ok(Box::pin(chunks))
            }
            Some(Scripted::Reject(error)) => Err(error),
            None => Err(TransportError::Connection(
                "no scripted response left".to_string(),
            )),
        }
    }
}

/// Sending side of a scripted response.
#[derive(Debug)]
pub struct ChunkFeed {
    tx: mpsc::UnboundedSender<ChunkResult>,
}

impl ChunkFeed {
    /// Deliver one raw chunk. Returns false once the reader is gone.
    pub fn chunk(&self, bytes: impl Into<Bytes>) -> bool {
        self.tx.send(Ok(bytes.into())).is_ok()
    }

    /// Deliver one newline-terminated line as a single chunk.
    pub fn line(&self, line: &str) -> bool {
        self.chunk(format!("{line}\n"))
    }

    /// Fail the stream mid-body.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// End the stream.
    pub fn finish(self) {}

    /// Whether the reading side has closed the connection.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
