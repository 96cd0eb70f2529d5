//! Wire protocol for the chat stream.
//!
//! Raw byte chunks are split into lines by [`LineDecoder`], and each line is
//! turned into a [`ProtocolEvent`] by [`parse_line`].

mod decoder;
mod event;

pub use decoder::*;
pub use event::*;
