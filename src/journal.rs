//! Append-only interaction log
//!
//! One JSON object per line per completed turn. Optional and
//! non-authoritative: the orchestrator warns and continues when a write
//! fails.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::Result;

#[derive(Serialize)]
struct JournalEntry<'a> {
    timestamp: String,
    user: &'a str,
    ai: &'a str,
}

/// Plaintext JSONL log of exchanged turns
pub struct InteractionJournal {
    path: PathBuf,
}

impl InteractionJournal {
    /// Create a journal writing to the given path
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one turn
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or written
    pub fn append(&self, user: &str, ai: &str) -> Result<()> {
        let entry = JournalEntry {
            timestamp: chrono::Local::now().to_rfc3339(),
            user,
            ai,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_turn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = InteractionJournal::new(path.clone());

        journal.append("hello", "hi there").unwrap();
        journal.append("bye", "see you").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["user"], "hello");
        assert_eq!(first["ai"], "hi there");
        assert!(first["timestamp"].as_str().is_some());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["user"], "bye");
    }
}
