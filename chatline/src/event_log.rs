//! Append-only display log of classified event lines.
//!
//! Entries are never edited or evicted; the terminal decides how much of the
//! tail to show.

use crate::classifier::LogEntry;
use chrono::{DateTime, Local};
use std::io;
use std::path::Path;

/// A log entry with the local time it was appended.
#[derive(Debug, Clone)]
pub struct LoggedEntry {
    pub received_at: DateTime<Local>,
    pub entry: LogEntry,
}

impl LoggedEntry {
    /// `HH:MM:SS` of the arrival time.
    pub fn timestamp(&self) -> String {
        self.received_at.format("%H:%M:%S").to_string()
    }
}

/// Visible event history of a chat session.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<LoggedEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn push(&mut self, entry: LogEntry) {
        self.push_at(entry, Local::now());
    }

    pub fn push_at(&mut self, entry: LogEntry, received_at: DateTime<Local>) {
        tracing::trace!("log[{}] {}", entry.category(), entry.text());
        self.entries.push(LoggedEntry { received_at, entry });
    }

    /// All entries in arrival order.
    pub fn entries(&self) -> &[LoggedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LoggedEntry> {
        self.entries.last()
    }

    /// Plain-text transcript, one line per entry.
    pub fn transcript(&self, with_timestamps: bool) -> String {
        let mut out = String::with_capacity(self.entries.len() * 48);
        for logged in &self.entries {
            if with_timestamps {
                out.push_str(&format!("{} ", logged.timestamp()));
            }
            out.push_str(logged.entry.text());
            out.push('\n');
        }
        out
    }

    /// Write the transcript to `path`, replacing any previous file.
    pub fn save_transcript(&self, path: &Path, with_timestamps: bool) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.transcript(with_timestamps))?;
        tracing::info!("saved {} log entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}
