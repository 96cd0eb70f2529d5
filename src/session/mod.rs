//! Streaming chat session and the transcript it maintains.

mod chat;
mod error;
mod observer;
mod state;
mod transcript;

pub use chat::*;
pub use error::*;
pub use observer::*;
pub use state::*;
pub use transcript::*;
