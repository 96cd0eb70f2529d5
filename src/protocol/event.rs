//! Protocol events carried on `data: ` lines.

use serde::Deserialize;

/// Prefix marking a protocol line. Any other line is ignored.
pub const DATA_PREFIX: &str = "data: ";

/// Typed event decoded from one protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Next slice of answer text, optionally with the current citation set.
    ContentFragment {
        text: String,
        sources: Option<Vec<String>>,
    },
    /// Complete citation set, replacing any previous one.
    SourcesUpdate { sources: Vec<String> },
    /// End of the answer.
    Completion { sources: Option<Vec<String>> },
    /// Protocol line whose payload is not a usable JSON object.
    MalformedLine { raw: String, reason: String },
}

impl ProtocolEvent {
    /// Returns true if this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion { .. })
    }

    /// Citation set carried by this event, if any.
    #[must_use]
    pub fn sources(&self) -> Option<&[String]> {
        match self {
            Self::ContentFragment { sources, .. } | Self::Completion { sources } => {
                sources.as_deref()
            }
            Self::SourcesUpdate { sources } => Some(sources),
            Self::MalformedLine { .. } => None,
        }
    }
}

/// Payload of a `data: ` line.
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sources: Option<Vec<String>>,
}

fn decode_record(payload: &str) -> Result<WireRecord, String> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("expected a JSON object".to_string());
    }
    WireRecord::deserialize(value).map_err(|e| e.to_string())
}

/// Parse one decoded line.
///
/// Returns `None` for lines without the `data: ` prefix (blank keep-alives
/// included) and for objects that carry none of the known fields. An empty
/// `sources` array is treated as absent.
#[must_use]
pub fn parse_line(line: &str) -> Option<ProtocolEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;

    let record = match decode_record(payload) {
        Ok(record) => record,
        Err(reason) => {
            return Some(ProtocolEvent::MalformedLine {
                raw: line.to_string(),
                reason,
            });
        }
    };

    let sources = record.sources.filter(|sources| !sources.is_empty());
    if record.done == Some(true) {
        return Some(ProtocolEvent::Completion { sources });
    }
    if let Some(text) = record.content {
        return Some(ProtocolEvent::ContentFragment { text, sources });
    }
    sources.map(|sources| ProtocolEvent::SourcesUpdate { sources })
}
