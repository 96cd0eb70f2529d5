//! ragchat - Streaming chat client for retrieval-augmented document Q&A.

pub mod config;
pub mod display;
pub mod documents;
pub mod protocol;
pub mod session;
pub mod transport;
