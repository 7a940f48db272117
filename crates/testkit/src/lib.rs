#![warn(missing_docs)]
//! Test doubles for label synchronization.
//!
//! A [`Journal`] records store calls and session deliveries in one ordered
//! stream, so tests can assert cross-collaborator ordering (for example that
//! a record is deleted before the removal message goes out).

mod journal;

pub use journal::*;

use anyhow::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: File,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self { file })
    }

    /// Append one record to the log.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }

    /// Append every journal entry.
    pub fn write_journal(&mut self, journal: &Journal) -> Result<usize> {
        let entries = journal.entries();
        for entry in &entries {
            self.write(entry)?;
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texter_core::SessionId;
    use texter_net::{removal_for, ServerMessage, SessionTransport};

    #[test]
    fn jsonl_sink_writes_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/journal.jsonl");

        let journal = Journal::new();
        let transport = journal.transport();
        transport.deliver(SessionId(1), &ServerMessage::RemoveEntity(removal_for(4)));
        transport.deliver(SessionId(2), &ServerMessage::RemoveEntity(removal_for(4)));

        let mut sink = JsonlSink::create(&path).expect("sink create");
        assert_eq!(sink.write_journal(&journal).unwrap(), 2);

        let contents = fs::read_to_string(&path).expect("file readable");
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"delivered\""));
    }
}
