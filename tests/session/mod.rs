//! Session tests driven through the scripted transport.

mod streaming_test;

use std::sync::Arc;

use ragchat::session::{ChatSession, SessionUpdate};
use ragchat::transport::ScriptedTransport;
use tokio::sync::mpsc;

pub fn session_for(transport: &ScriptedTransport) -> ChatSession {
    ChatSession::new(Arc::new(transport.clone()))
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> Vec<SessionUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

/// Verify the public session types are exported from the library.
#[test]
fn test_all_session_types_exported() {
    use ragchat::session::{
        Canceller, Message, Role, SessionError, SessionObserver, SessionState,
        SessionStateMachine, StreamHandle, StreamStats, Transcript, TranscriptStore,
    };

    fn assert_observer<O: SessionObserver>() {}
    assert_observer::<()>();
    assert_observer::<mpsc::UnboundedSender<SessionUpdate>>();

    let _ = SessionStateMachine::new();
    let _ = TranscriptStore::new();
    let _ = Transcript::default();
    let _ = StreamStats::default();
    let _ = Message::user("hi").role == Role::User;
    let _ = SessionState::Idle;
    let _: fn() -> SessionError = || SessionError::Conflict;
    let _: Option<&StreamHandle> = None;
    let _: Option<&Canceller> = None;
}
