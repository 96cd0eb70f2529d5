//! Incremental UTF-8 line decoder.
//!
//! Chunk boundaries may fall anywhere, including inside a multi-byte
//! character or between `\r` and `\n`. Bytes are decoded exactly once: only
//! the incomplete tail of a character is carried over to the next chunk.

/// Errors raised while decoding the byte stream.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Byte sequence that can never form valid UTF-8.
    #[error("Invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// Stream ended inside a multi-byte character.
    #[error("Stream ended inside a multi-byte character ({bytes} dangling bytes)")]
    Truncated { bytes: usize },
}

/// Turns byte chunks into complete text lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes of a character split across chunks.
    undecoded: Vec<u8>,
    /// Decoded text of a line with no terminator yet.
    pending: String,
    /// Bytes decoded so far, for error offsets.
    consumed: usize,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completes.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidUtf8` if the chunk contains a byte
    /// sequence that is not UTF-8.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, DecodeError> {
        self.undecoded.extend_from_slice(chunk);

        let valid = match std::str::from_utf8(&self.undecoded) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_some() => {
                return Err(DecodeError::InvalidUtf8 {
                    offset: self.consumed + e.valid_up_to(),
                });
            }
            Err(e) => e.valid_up_to(),
        };

        let tail = self.undecoded.split_off(valid);
        let decoded = std::mem::replace(&mut self.undecoded, tail);
        let text = String::from_utf8(decoded).map_err(|e| DecodeError::InvalidUtf8 {
            offset: self.consumed + e.utf8_error().valid_up_to(),
        })?;
        self.consumed += valid;

        let scan_from = self.pending.len();
        self.pending.push_str(&text);

        let mut lines = Vec::new();
        if let Some(last) = self.pending[scan_from..].rfind('\n') {
            let rest = self.pending.split_off(scan_from + last + 1);
            let complete = std::mem::replace(&mut self.pending, rest);
            lines.extend(
                complete[..complete.len() - 1]
                    .split('\n')
                    .map(|line| strip_cr(line).to_string()),
            );
        }
        Ok(lines)
    }

    /// Finish the stream, returning the unterminated last line if any.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Truncated` if the stream ended inside a
    /// multi-byte character.
    pub fn flush(&mut self) -> Result<Option<String>, DecodeError> {
        let dangling = std::mem::take(&mut self.undecoded);
        let pending = std::mem::take(&mut self.pending);
        if !dangling.is_empty() {
            return Err(DecodeError::Truncated {
                bytes: dangling.len(),
            });
        }

        let line = strip_cr(&pending);
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line.to_string()))
        }
    }

    /// Whether any partial line or character is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.undecoded.is_empty() || !self.pending.is_empty()
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}
