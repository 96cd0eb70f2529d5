//! Notification surface for the rendering layer.

use tokio::sync::mpsc;

use super::{SessionError, Transcript};

/// Receives session notifications on the task driving the stream.
///
/// Each notification fires after the transcript change it reports has been
/// applied. No notification starts once the exchange has been cancelled; a
/// callback already running when `cancel` returns still runs to the end.
/// Every method defaults to a no-op.
pub trait SessionObserver: Send {
    /// The assistant reply gained text or a new citation set.
    fn on_progress(&mut self, _transcript: &Transcript) {}

    /// The reply is complete.
    fn on_done(&mut self, _transcript: &Transcript) {}

    /// The stream failed; the reply carries the error text.
    fn on_error(&mut self, _error: &SessionError, _transcript: &Transcript) {}

    /// A protocol line could not be parsed and was skipped.
    fn on_warning(&mut self, _raw_line: &str) {}
}

impl SessionObserver for () {}

/// Session notification as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Progress(Transcript),
    Done(Transcript),
    Error {
        error: SessionError,
        transcript: Transcript,
    },
    Warning(String),
}

impl SessionObserver for mpsc::UnboundedSender<SessionUpdate> {
    fn on_progress(&mut self, transcript: &Transcript) {
        let _ = self.send(SessionUpdate::Progress(transcript.clone()));
    }

    fn on_done(&mut self, transcript: &Transcript) {
        let _ = self.send(SessionUpdate::Done(transcript.clone()));
    }

    fn on_error(&mut self, error: &SessionError, transcript: &Transcript) {
        let _ = self.send(SessionUpdate::Error {
            error: error.clone(),
            transcript: transcript.clone(),
        });
    }

    fn on_warning(&mut self, raw_line: &str) {
        let _ = self.send(SessionUpdate::Warning(raw_line.to_string()));
    }
}
