//! Conversation transcript and its shared store.
//!
//! The transcript is append-only except for the trailing assistant reply,
//! which the session mutates in place while it streams.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Documents that grounded the answer, in server order.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
        }
    }
}

/// Ordered conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The trailing assistant message, if the transcript ends with one.
    #[must_use]
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.role == Role::Assistant)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    fn reply_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|m| m.role == Role::Assistant)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Shared handle to a transcript.
///
/// Clones observe the same transcript. Only the owning session writes to it.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    inner: Arc<RwLock<Transcript>>,
}

impl TranscriptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Transcript> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Transcript> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current transcript.
    #[must_use]
    pub fn snapshot(&self) -> Transcript {
        self.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<Message> {
        self.read().last().cloned()
    }

    /// Append the user prompt and an empty assistant reply slot.
    pub(crate) fn begin_exchange(&self, prompt: String) {
        let mut transcript = self.write();
        transcript.messages.push(Message::user(prompt));
        transcript
            .messages
            .push(Message::assistant(String::new(), Vec::new()));
    }

    /// Mutate the trailing reply and return the resulting transcript.
    pub(crate) fn update_reply(&self, update: impl FnOnce(&mut Message)) -> Option<Transcript> {
        let mut transcript = self.write();
        update(transcript.reply_mut()?);
        Some(transcript.clone())
    }
}
