//! Client for the document store that grounds chat answers.

mod client;
mod types;

pub use client::*;
pub use types::*;
