//! Session state machine.

use serde::{Deserialize, Serialize};

use super::SessionError;

/// Lifecycle of the current exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn is_streaming(self) -> bool {
        self == Self::Streaming
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// State machine for one chat session.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
    stats: StreamStats,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Enter `Streaming` for a new exchange and reset the counters.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Conflict` without touching any state if an
    /// exchange is already streaming.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.state.is_streaming() {
            return Err(SessionError::Conflict);
        }
        self.transition(SessionState::Streaming);
        self.stats = StreamStats::default();
        Ok(())
    }

    /// Leave `Streaming` for a terminal state.
    ///
    /// Returns false, leaving the state unchanged, if the machine is not
    /// streaming or `outcome` is not terminal.
    pub fn finish(&mut self, outcome: SessionState) -> bool {
        if !self.state.is_streaming() || !outcome.is_terminal() {
            tracing::debug!(from = ?self.state, to = ?outcome, "Ignoring state transition");
            return false;
        }
        self.transition(outcome);
        true
    }

    fn transition(&mut self, new_state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    pub fn record_fragment(&mut self) {
        self.stats.fragments = self.stats.fragments.saturating_add(1);
    }

    pub fn record_sources_update(&mut self) {
        self.stats.source_updates = self.stats.source_updates.saturating_add(1);
    }

    pub fn record_malformed_line(&mut self) {
        self.stats.malformed_lines = self.stats.malformed_lines.saturating_add(1);
    }

    pub fn record_bytes(&mut self, bytes: usize) {
        self.stats.bytes = self.stats.bytes.saturating_add(bytes);
    }

    #[must_use]
    pub fn stats(&self) -> StreamStats {
        self.stats
    }
}

/// Counters for the current exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub fragments: usize,
    pub source_updates: usize,
    pub malformed_lines: usize,
    pub bytes: usize,
}
