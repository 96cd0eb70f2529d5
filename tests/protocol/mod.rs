//! Decoder and parser working together over split chunks.

use ragchat::protocol::{parse_line, LineDecoder, ProtocolEvent};

const STREAM: &str = concat!(
    "data: {\"content\":\"Zürich \"}\n",
    ": keep-alive\n",
    "\n",
    "data: {\"content\":\"is 🦀-friendly.\",\"sources\":[\"guide.pdf\"]}\r\n",
    "data: {not json}\n",
    "data: {\"sources\":[\"guide.pdf\",\"faq.md\"]}\n",
    "data: {\"done\":true}\n",
);

fn events_for(chunks: &[&[u8]]) -> Vec<ProtocolEvent> {
    let mut decoder = LineDecoder::new();
    let mut events = Vec::new();
    for chunk in chunks {
        for line in decoder.feed(chunk).unwrap() {
            events.extend(parse_line(&line));
        }
    }
    if let Some(line) = decoder.flush().unwrap() {
        events.extend(parse_line(&line));
    }
    events
}

fn expected() -> Vec<ProtocolEvent> {
    vec![
        ProtocolEvent::ContentFragment {
            text: "Zürich ".to_string(),
            sources: None,
        },
        ProtocolEvent::ContentFragment {
            text: "is 🦀-friendly.".to_string(),
            sources: Some(vec!["guide.pdf".to_string()]),
        },
        ProtocolEvent::MalformedLine {
            raw: "data: {not json}".to_string(),
            reason: serde_json::from_str::<serde_json::Value>("{not json}")
                .unwrap_err()
                .to_string(),
        },
        ProtocolEvent::SourcesUpdate {
            sources: vec!["guide.pdf".to_string(), "faq.md".to_string()],
        },
        ProtocolEvent::Completion { sources: None },
    ]
}

#[test]
fn test_pipeline_whole_stream() {
    assert_eq!(events_for(&[STREAM.as_bytes()]), expected());
}

#[test]
fn test_pipeline_is_independent_of_chunking() {
    let bytes = STREAM.as_bytes();
    for size in [1, 2, 3, 5, 7, 13] {
        let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
        assert_eq!(events_for(&chunks), expected(), "chunk size {size}");
    }
}

#[test]
fn test_pipeline_only_terminal_event_is_done() {
    let events = events_for(&[STREAM.as_bytes()]);
    let terminal: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| event.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminal, vec![events.len() - 1]);
}
