// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Append-only write-ahead log of [`Event`]s.
//!
//! Entries are newline-delimited JSON `{seq, event}` records. The WAL is
//! the durability boundary: an event is committed once `append` + `flush`
//! return, and the materialized state is rebuilt by replaying every entry
//! past the snapshot's `processed_seq` on startup.

use gm_core::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One durable WAL record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Errors from WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt WAL entry at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode WAL entry: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Append-only event log.
#[derive(Debug)]
pub struct Wal {
    file: File,
    path: PathBuf,
    write_seq: u64,
    processed_seq: u64,
    /// Entries appended (or replayed from disk) but not yet marked processed
    unprocessed: VecDeque<WalEntry>,
}

impl Wal {
    /// Open (or create) the WAL at `path`.
    ///
    /// Entries with `seq > processed_seq` are queued for replay via
    /// [`Wal::next_unprocessed`] — `processed_seq` comes from the last
    /// snapshot, so a fresh store passes 0.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        let mut unprocessed = VecDeque::new();
        // Seed from the snapshot's cursor so numbering survives compaction
        // (a compacted log may hold no entries at all).
        let mut write_seq = processed_seq;

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: WalEntry = serde_json::from_str(&line)
                    .map_err(|source| WalError::Corrupt { line: idx + 1, source })?;
                write_seq = write_seq.max(entry.seq);
                if entry.seq > processed_seq {
                    unprocessed.push_back(entry);
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            write_seq,
            processed_seq,
            unprocessed,
        })
    }

    /// Append an event; returns its sequence number.
    ///
    /// The entry is written to the OS immediately but only made durable by
    /// [`Wal::flush`].
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let entry = WalEntry { seq, event: event.clone() };
        let mut line = serde_json::to_string(&entry).map_err(WalError::Encode)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.write_seq = seq;
        self.unprocessed.push_back(entry);
        Ok(seq)
    }

    /// Force written entries to stable storage.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Next entry not yet marked processed, in append order.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        Ok(self.unprocessed.pop_front())
    }

    /// Record that everything up to `seq` has been applied to state.
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// Last appended sequence number.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Last applied sequence number.
    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Truncate the log after a checkpoint has captured state through
    /// `processed_seq`. Entries still unprocessed are preserved.
    pub fn compact(&mut self) -> Result<(), WalError> {
        let keep: Vec<WalEntry> = self.unprocessed.iter().cloned().collect();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        for entry in &keep {
            let mut line = serde_json::to_string(entry).map_err(WalError::Encode)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        file.sync_data()?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
