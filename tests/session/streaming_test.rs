//! Happy-path streaming: accumulation, sources, completion.

use ragchat::session::{Message, Role, SessionError, SessionState, SessionUpdate};
use ragchat::transport::ScriptedTransport;
use tokio::sync::mpsc;

use super::{drain, session_for};

#[tokio::test]
async fn completion_scenario_builds_transcript() {
    let transport = ScriptedTransport::new();
    transport.respond_with([
        "data: {\"content\":\"X is \"}\n",
        "not-data-prefixed: ignore me\n",
        "data: {\"content\":\"a thing.\"}\n",
        "data: {\"done\":true,\"sources\":[\"doc1.pdf\"]}\n",
    ]);
    let session = session_for(&transport);

    let handle = session.send("What is X?", true, ()).unwrap();
    handle.wait().await.unwrap();

    let transcript = session.transcript().snapshot();
    assert_eq!(
        transcript.messages(),
        &[
            Message::user("What is X?"),
            Message::assistant("X is a thing.", vec!["doc1.pdf".to_string()]),
        ]
    );
    assert_eq!(session.state(), SessionState::Completed);
}

#[tokio::test]
async fn request_always_asks_for_streaming() {
    let transport = ScriptedTransport::new();
    transport.respond_with(["data: {\"done\":true}\n"]);
    let session = session_for(&transport);

    session.send("q", false, ()).unwrap().wait().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "q");
    assert!(!requests[0].use_rag);
    assert!(requests[0].is_streaming());
}

#[tokio::test]
async fn fragments_accumulate_in_order() {
    let texts = ["The ", "quick ", "", "brown ", "fox"];
    let transport = ScriptedTransport::new();
    transport.respond_with(
        texts
            .iter()
            .map(|t| format!("data: {}\n", serde_json::json!({"content": t, "done": false}))),
    );
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.send("q", true, tx).unwrap().wait().await.unwrap();

    let reply = session.transcript().last().unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, texts.concat());

    let updates = drain(&mut rx);
    let progress = updates
        .iter()
        .filter(|u| matches!(u, SessionUpdate::Progress(_)))
        .count();
    assert_eq!(progress, texts.len());
    assert!(matches!(updates.last(), Some(SessionUpdate::Done(_))));
    assert_eq!(session.stats().fragments, texts.len());
}

#[tokio::test]
async fn progress_snapshots_grow_monotonically() {
    let transport = ScriptedTransport::new();
    transport.respond_with([
        "data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\n",
        "data: {\"content\":\"c\"}\n",
    ]);
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.send("q", true, tx).unwrap().wait().await.unwrap();

    let contents: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|u| match u {
            SessionUpdate::Progress(t) => t.last_reply().map(|m| m.content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(contents, vec!["a", "ab", "abc"]);
}

#[tokio::test]
async fn sources_are_replaced_not_merged() {
    let transport = ScriptedTransport::new();
    let feed = transport.respond();
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = session.send("q", true, tx).unwrap();

    feed.line(r#"data: {"content":"a","sources":["one.pdf","two.pdf"]}"#);
    rx.recv().await.unwrap();
    assert_eq!(
        session.transcript().last().unwrap().sources,
        vec!["one.pdf", "two.pdf"]
    );

    feed.line(r#"data: {"sources":["three.pdf"]}"#);
    rx.recv().await.unwrap();
    assert_eq!(session.transcript().last().unwrap().sources, vec!["three.pdf"]);

    feed.line(r#"data: {"content":"b","sources":[]}"#);
    rx.recv().await.unwrap();
    assert_eq!(session.transcript().last().unwrap().sources, vec!["three.pdf"]);

    feed.line(r#"data: {"done":true,"sources":["four.pdf"]}"#);
    handle.wait().await.unwrap();

    let reply = session.transcript().last().unwrap();
    assert_eq!(reply.content, "ab");
    assert_eq!(reply.sources, vec!["four.pdf"]);
    assert_eq!(session.stats().source_updates, 3);
}

#[tokio::test]
async fn stream_end_without_done_completes() {
    let transport = ScriptedTransport::new();
    transport.respond_with(["data: {\"content\":\"partial\"}\n", "data: {\"content\":\" end\"}"]);
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.send("q", true, tx).unwrap().wait().await.unwrap();

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.transcript().last().unwrap().content, "partial end");
    assert!(matches!(
        drain(&mut rx).last(),
        Some(SessionUpdate::Done(_))
    ));
}

#[tokio::test]
async fn chunk_split_inside_character_and_line() {
    let payload = "data: {\"content\":\"caf\u{e9} \u{1f980}\"}\r\ndata: {\"done\":true}\n";
    let bytes = payload.as_bytes();
    let crab_at = payload.find('\u{1f980}').unwrap();
    let transport = ScriptedTransport::new();
    transport.respond_with([
        bytes[..crab_at + 2].to_vec(),
        bytes[crab_at + 2..crab_at + 3].to_vec(),
        bytes[crab_at + 3..].to_vec(),
    ]);
    let session = session_for(&transport);

    session.send("q", true, ()).unwrap().wait().await.unwrap();

    assert_eq!(
        session.transcript().last().unwrap().content,
        "caf\u{e9} \u{1f980}"
    );
}

#[tokio::test]
async fn lines_after_done_are_ignored() {
    let transport = ScriptedTransport::new();
    transport.respond_with([
        "data: {\"content\":\"x\"}\ndata: {\"done\":true}\ndata: {\"content\":\"late\"}\n",
    ]);
    let session = session_for(&transport);

    session.send("q", true, ()).unwrap().wait().await.unwrap();
    assert_eq!(session.transcript().last().unwrap().content, "x");
}

#[tokio::test]
async fn malformed_line_warns_and_continues() {
    let transport = ScriptedTransport::new();
    transport.respond_with([
        "data: {\"content\":\"ok \"}\n",
        "data: {broken\n",
        "data: {\"content\":\"still ok\"}\n",
        "data: {\"done\":true}\n",
    ]);
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.send("q", true, tx).unwrap().wait().await.unwrap();

    assert_eq!(session.transcript().last().unwrap().content, "ok still ok");
    assert_eq!(session.stats().malformed_lines, 1);
    let warnings: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|u| match u {
            SessionUpdate::Warning(raw) => Some(raw),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec!["data: {broken"]);
}

#[tokio::test]
async fn second_send_while_streaming_conflicts() {
    let transport = ScriptedTransport::new();
    let feed = transport.respond();
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = session.send("first", true, tx).unwrap();

    feed.line(r#"data: {"content":"so far"}"#);
    rx.recv().await.unwrap();
    let before = session.transcript().snapshot();

    let second = session.send("second", true, ());
    assert_eq!(second.err(), Some(SessionError::Conflict));
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(session.transcript().snapshot(), before);
    assert_eq!(transport.requests().len(), 1);

    feed.line(r#"data: {"done":true}"#);
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn new_send_after_completion_appends() {
    let transport = ScriptedTransport::new();
    transport.respond_with(["data: {\"content\":\"one\"}\n"]);
    transport.respond_with(["data: {\"content\":\"two\"}\n"]);
    let session = session_for(&transport);

    session.send("first", true, ()).unwrap().wait().await.unwrap();
    session.send("second", true, ()).unwrap().wait().await.unwrap();

    let transcript = session.transcript().snapshot();
    let contents: Vec<&str> = transcript.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "one", "second", "two"]);
    assert_eq!(session.state(), SessionState::Completed);
}

#[tokio::test]
async fn completion_sources_are_reported_as_progress() {
    let transport = ScriptedTransport::new();
    transport.respond_with(["data: {\"content\":\"x\"}\n", "data: {\"done\":true,\"sources\":[\"doc1.pdf\"]}\n"]);
    let session = session_for(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.send("q", true, tx).unwrap().wait().await.unwrap();

    let sources: Vec<Option<Vec<String>>> = drain(&mut rx)
        .into_iter()
        .map(|u| match u {
            SessionUpdate::Progress(t) => t.last_reply().map(|m| m.sources.clone()),
            SessionUpdate::Done(_) => None,
            other => panic!("Unexpected update: {other:?}"),
        })
        .collect();
    assert_eq!(
        sources,
        vec![
            Some(Vec::new()),
            Some(vec!["doc1.pdf".to_string()]),
            None
        ]
    );
}
