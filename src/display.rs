//! Colored terminal rendering for chat answers and document listings.
//!
//! [`TerminalObserver`] is the terminal's rendering layer: it prints each
//! new slice of the streaming reply as it lands in the transcript.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::documents::{DocumentInfo, KnowledgeBaseStatus};
use crate::session::{SessionError, SessionObserver, Transcript};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let head: String = s.chars().take(max_len - 3).collect();
    format!("{head}...")
}

/// Print the citation list of an answer.
pub fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    println!("{} {}", "[SOURCES]".blue().bold(), sources.join(", ").cyan());
    let _ = io::stdout().flush();
}

/// Print a complete, non-streamed answer.
pub fn print_reply(response: &str, sources: &[String]) {
    println!("{response}");
    print_sources(sources);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

/// Print a skipped protocol line.
pub fn print_warning(raw_line: &str, raw_mode: bool) {
    eprintln!(
        "{} {} {}",
        timestamp().dimmed(),
        "[WARN]".yellow().bold(),
        truncate(raw_line, 80, raw_mode).dimmed()
    );
}

/// Print the cancellation marker after an interrupted answer.
pub fn print_cancelled() {
    println!();
    println!("{}", "[CANCELLED]".yellow().bold());
    let _ = io::stdout().flush();
}

/// Print the document table.
pub fn print_documents(documents: &[DocumentInfo]) {
    if documents.is_empty() {
        println!("{}", "No documents indexed".dimmed());
        return;
    }
    for doc in documents {
        println!(
            "{} {} {}",
            doc.filename.bold(),
            format!("({} chunks)", doc.chunks).dimmed(),
            doc.added_at.dimmed()
        );
    }
}

/// Print a successful upload.
pub fn print_uploaded(doc: &DocumentInfo) {
    println!(
        "{} {} ({} chunks)",
        "[UPLOADED]".green().bold(),
        doc.filename,
        doc.chunks
    );
}

/// Print the knowledge base summary.
pub fn print_status(status: &KnowledgeBaseStatus) {
    println!(
        "{} {} documents, {} chunks",
        "[STATUS]".blue().bold(),
        status.documents_count,
        status.total_chunks
    );
    println!(
        "  model={} embedding_model={} conversation_length={}",
        status.model.cyan(),
        status.embedding_model.cyan(),
        status.conversation_length
    );
}

/// Streams the trailing assistant reply to stdout.
#[derive(Debug, Default)]
pub struct TerminalObserver {
    /// Bytes of the reply already written.
    printed: usize,
    raw_mode: bool,
}

impl TerminalObserver {
    #[must_use]
    pub fn new(raw_mode: bool) -> Self {
        Self {
            printed: 0,
            raw_mode,
        }
    }

    /// Part of `content` not yet written, advancing the cursor.
    fn unprinted<'a>(&mut self, content: &'a str) -> &'a str {
        let fresh = content.get(self.printed..).unwrap_or_default();
        self.printed = content.len();
        fresh
    }
}

impl SessionObserver for TerminalObserver {
    fn on_progress(&mut self, transcript: &Transcript) {
        if let Some(reply) = transcript.last_reply() {
            print!("{}", self.unprinted(&reply.content));
            let _ = io::stdout().flush();
        }
    }

    fn on_done(&mut self, transcript: &Transcript) {
        if let Some(reply) = transcript.last_reply() {
            println!("{}", self.unprinted(&reply.content));
            print_sources(&reply.sources);
        }
    }

    fn on_error(&mut self, error: &SessionError, _transcript: &Transcript) {
        println!();
        print_error(&error.to_string());
    }

    fn on_warning(&mut self, raw_line: &str) {
        print_warning(raw_line, self.raw_mode);
    }
}
