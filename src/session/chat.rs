//! Streaming chat session.
//!
//! A [`ChatSession`] owns at most one in-flight exchange. [`ChatSession::send`]
//! appends the prompt and an empty reply to the transcript, then spawns a
//! driver task that reads the transport, decodes lines, parses events and
//! folds them into the reply.

use std::fmt::{self, Write as _};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::display::truncate;
use crate::protocol::{parse_line, LineDecoder, ProtocolEvent};
use crate::transport::{ChatRequest, Transport, TransportError};

use super::{
    Message, SessionError, SessionObserver, SessionState, SessionStateMachine, StreamStats,
    Transcript, TranscriptStore,
};

/// Maximum length of a malformed line echoed into the log.
const MAX_LOGGED_LINE: usize = 120;

#[derive(Debug, Default)]
struct Control {
    machine: SessionStateMachine,
    /// Incremented by every `send`; identifies the current exchange.
    generation: u64,
}

impl Control {
    fn is_live(&self, generation: u64) -> bool {
        self.generation == generation && self.machine.state().is_streaming()
    }
}

fn lock(control: &Mutex<Control>) -> MutexGuard<'_, Control> {
    control.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chat session with at most one active stream.
pub struct ChatSession {
    id: Uuid,
    transport: Arc<dyn Transport>,
    transcript: TranscriptStore,
    control: Arc<Mutex<Control>>,
    idle_timeout: Option<Duration>,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Create a session with an empty transcript and no idle timeout.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            transcript: TranscriptStore::new(),
            control: Arc::new(Mutex::new(Control::default())),
            idle_timeout: None,
        }
    }

    /// Fail a stream when no bytes arrive within `timeout`.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Shared read handle to the transcript.
    #[must_use]
    pub fn transcript(&self) -> TranscriptStore {
        self.transcript.clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        lock(&self.control).machine.state()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state().is_streaming()
    }

    /// Counters for the current or last exchange.
    #[must_use]
    pub fn stats(&self) -> StreamStats {
        lock(&self.control).machine.stats()
    }

    /// Send a prompt and stream the answer into the transcript.
    ///
    /// Notifications are delivered to `observer` from the driver task.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Conflict`, leaving the transcript and state
    /// untouched, if a previous answer is still streaming.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn send(
        &self,
        prompt: impl Into<String>,
        use_rag: bool,
        observer: impl SessionObserver + 'static,
    ) -> Result<StreamHandle, SessionError> {
        let prompt = prompt.into();
        let generation = {
            let mut control = lock(&self.control);
            control.machine.begin()?;
            control.generation += 1;
            self.transcript.begin_exchange(prompt.clone());
            control.generation
        };

        tracing::info!(
            session_id = %self.id,
            generation,
            use_rag,
            prompt_len = prompt.len(),
            "Sending chat request"
        );

        let token = CancellationToken::new();
        let driver = StreamDriver {
            transport: Arc::clone(&self.transport),
            transcript: self.transcript.clone(),
            control: Arc::clone(&self.control),
            generation,
            token: token.clone(),
            idle_timeout: self.idle_timeout,
            observer: Box::new(observer),
        };
        let request = ChatRequest::streaming(prompt, use_rag);
        let span = tracing::info_span!("chat_stream", session_id = %self.id, generation);
        let task = tokio::spawn(driver.run(request).instrument(span));

        Ok(StreamHandle {
            canceller: Canceller {
                control: Arc::clone(&self.control),
                generation,
                token,
            },
            task,
        })
    }
}

/// Cancels one exchange. Cloneable so it can outlive a borrowed handle.
#[derive(Debug, Clone)]
pub struct Canceller {
    control: Arc<Mutex<Control>>,
    generation: u64,
    token: CancellationToken,
}

impl Canceller {
    /// Stop the exchange if it is still streaming.
    ///
    /// The session moves to `Failed`, the transport is closed, and the
    /// transcript keeps exactly what had been applied. Returns false if the
    /// exchange had already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let mut control = lock(&self.control);
            control.is_live(self.generation) && control.machine.finish(SessionState::Failed)
        };
        if cancelled {
            self.token.cancel();
            tracing::info!(generation = self.generation, "Chat stream cancelled");
        }
        cancelled
    }
}

/// Handle to an in-flight exchange.
#[derive(Debug)]
pub struct StreamHandle {
    canceller: Canceller,
    task: JoinHandle<Result<(), SessionError>>,
}

impl StreamHandle {
    /// See [`Canceller::cancel`].
    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    #[must_use]
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// State of this exchange, or `None` once a newer send has replaced it.
    #[must_use]
    pub fn state(&self) -> Option<SessionState> {
        let control = lock(&self.canceller.control);
        (control.generation == self.canceller.generation).then(|| control.machine.state())
    }

    /// Whether the driver task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the exchange to end.
    ///
    /// # Errors
    ///
    /// Returns the error that failed the stream, `SessionError::Cancelled`
    /// after a cancel, or `SessionError::Aborted` if the driver task died.
    pub async fn wait(self) -> Result<(), SessionError> {
        self.task
            .await
            .unwrap_or_else(|e| Err(SessionError::Aborted(e.to_string())))
    }
}

/// Outcome of handling one line.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

/// Await `future`, failing with `IdleTimeout` if it takes longer than `limit`.
async fn within<F: Future>(limit: Option<Duration>, future: F) -> Result<F::Output, TransportError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| TransportError::IdleTimeout(limit)),
        None => Ok(future.await),
    }
}

/// Keep partial content and append the failure.
fn annotate_failure(reply: &mut Message, error: &SessionError) {
    if reply.content.is_empty() {
        reply.content = format!("Error: {error}");
    } else {
        let _ = write!(reply.content, "\n\nError: {error}");
    }
}

/// Drives one exchange from request to terminal state.
struct StreamDriver {
    transport: Arc<dyn Transport>,
    transcript: TranscriptStore,
    control: Arc<Mutex<Control>>,
    generation: u64,
    token: CancellationToken,
    idle_timeout: Option<Duration>,
    observer: Box<dyn SessionObserver>,
}

impl StreamDriver {
    async fn run(mut self, request: ChatRequest) -> Result<(), SessionError> {
        let result = self.drive(&request).await;
        let applied = match &result {
            Ok(()) => self.complete(),
            Err(SessionError::Cancelled) => false,
            Err(error) => self.fail(error),
        };

        if applied {
            result
        } else {
            tracing::debug!("Stream ended after cancellation");
            Err(SessionError::Cancelled)
        }
    }

    /// Read the stream until completion. The transport is dropped, closing
    /// the connection, on every return path.
    async fn drive(&mut self, request: &ChatRequest) -> Result<(), SessionError> {
        let transport = Arc::clone(&self.transport);
        let token = self.token.clone();
        let idle_timeout = self.idle_timeout;

        let mut chunks = tokio::select! {
            biased;
            () = token.cancelled() => return Err(SessionError::Cancelled),
            opened = within(idle_timeout, transport.open(request)) => opened??,
        };
        tracing::debug!("Chat stream open");

        let mut decoder = LineDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return Err(SessionError::Cancelled),
                next = within(idle_timeout, chunks.next()) => next?,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            self.live_control()?.machine.record_bytes(chunk.len());

            for line in decoder.feed(&chunk)? {
                if self.handle_line(&line)? == Flow::Finished {
                    return Ok(());
                }
            }
        }

        if let Some(line) = decoder.flush()? {
            if self.handle_line(&line)? == Flow::Finished {
                return Ok(());
            }
        }
        tracing::debug!("Stream ended without a completion event");
        Ok(())
    }

    fn live_control(&self) -> Result<MutexGuard<'_, Control>, SessionError> {
        let control = lock(&self.control);
        if control.is_live(self.generation) {
            Ok(control)
        } else {
            Err(SessionError::Cancelled)
        }
    }

    /// Apply `update` to the reply while the exchange is live.
    fn apply(
        &self,
        update: impl FnOnce(&mut SessionStateMachine, &mut Message),
    ) -> Result<Transcript, SessionError> {
        let mut control = self.live_control()?;
        let machine = &mut control.machine;
        self.transcript
            .update_reply(|reply| update(machine, reply))
            .ok_or_else(|| SessionError::Aborted("transcript has no reply slot".to_string()))
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow, SessionError> {
        let Some(event) = parse_line(line) else {
            return Ok(Flow::Continue);
        };

        match event {
            ProtocolEvent::ContentFragment { text, sources } => {
                let snapshot = self.apply(|machine, reply| {
                    reply.content.push_str(&text);
                    machine.record_fragment();
                    if let Some(sources) = sources {
                        reply.sources = sources;
                        machine.record_sources_update();
                    }
                })?;
                self.notify_progress(&snapshot);
                Ok(Flow::Continue)
            }
            ProtocolEvent::SourcesUpdate { sources } => {
                let snapshot = self.apply(|machine, reply| {
                    reply.sources = sources;
                    machine.record_sources_update();
                })?;
                self.notify_progress(&snapshot);
                Ok(Flow::Continue)
            }
            ProtocolEvent::Completion { sources } => {
                if let Some(sources) = sources {
                    let snapshot = self.apply(|machine, reply| {
                        reply.sources = sources;
                        machine.record_sources_update();
                    })?;
                    self.notify_progress(&snapshot);
                }
                Ok(Flow::Finished)
            }
            ProtocolEvent::MalformedLine { raw, reason } => {
                self.live_control()?.machine.record_malformed_line();
                tracing::warn!(
                    reason = %reason,
                    line = %truncate(&raw, MAX_LOGGED_LINE, false),
                    "Skipping malformed protocol line"
                );
                self.observer.on_warning(&raw);
                Ok(Flow::Continue)
            }
        }
    }

    /// Report an applied change unless the exchange was cancelled since.
    fn notify_progress(&mut self, snapshot: &Transcript) {
        if lock(&self.control).is_live(self.generation) {
            self.observer.on_progress(snapshot);
        }
    }

    fn complete(&mut self) -> bool {
        let snapshot = {
            let mut control = lock(&self.control);
            if !control.is_live(self.generation) {
                return false;
            }
            control.machine.finish(SessionState::Completed);
            let stats = control.machine.stats();
            tracing::info!(
                fragments = stats.fragments,
                source_updates = stats.source_updates,
                malformed_lines = stats.malformed_lines,
                bytes = stats.bytes,
                "Chat stream completed"
            );
            self.transcript.snapshot()
        };
        self.observer.on_done(&snapshot);
        true
    }

    fn fail(&mut self, error: &SessionError) -> bool {
        let snapshot = {
            let mut control = lock(&self.control);
            if !control.is_live(self.generation) {
                return false;
            }
            self.transcript
                .update_reply(|reply| annotate_failure(reply, error));
            control.machine.finish(SessionState::Failed);
            tracing::warn!(error = %error, "Chat stream failed");
            self.transcript.snapshot()
        };
        self.observer.on_error(error, &snapshot);
        true
    }
}
