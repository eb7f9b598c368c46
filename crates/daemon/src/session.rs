// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Per-user stdio line readers.
//!
//! Clients retrieve standard streams line by line while the DRM is still
//! appending to them. The registry keeps one incremental reader per
//! (job, stream), bounded per user; readers re-open the file on every call
//! and never hold a descriptor across requests, so an external writer and
//! a rotated path are both tolerated.

use gm_core::{JobId, UserId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Which standard stream to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Readers kept per user before the oldest is evicted.
const MAX_READERS_PER_USER: usize = 64;

#[derive(Debug, Clone)]
struct ReadCursor {
    path: PathBuf,
    offset: u64,
}

#[derive(Default)]
struct UserSession {
    cursors: HashMap<(JobId, StreamKind), ReadCursor>,
    /// Insertion order for eviction
    order: VecDeque<(JobId, StreamKind)>,
}

impl UserSession {
    fn cursor(&mut self, key: (JobId, StreamKind), path: &Path) -> &mut ReadCursor {
        // The stream was re-routed: start over on the new file
        let rerouted = self.cursors.get(&key).map(|c| c.path != path).unwrap_or(false);
        if rerouted {
            self.cursors.remove(&key);
        }
        if !self.cursors.contains_key(&key) {
            if self.cursors.len() >= MAX_READERS_PER_USER {
                while let Some(old) = self.order.pop_front() {
                    if self.cursors.remove(&old).is_some() {
                        break;
                    }
                }
            }
            self.order.push_back(key);
            self.cursors
                .insert(key, ReadCursor { path: path.to_path_buf(), offset: 0 });
        }
        // Just inserted or already present
        self.cursors.get_mut(&key).unwrap_or_else(|| unreachable!("cursor inserted above"))
    }
}

/// Bounded per-user registry of incremental stdio readers.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, UserSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the next line of `path`, resuming where the previous call for
    /// this (user, job, stream) left off.
    ///
    /// Returns `None` when no new bytes are available. A trailing partial
    /// line (no newline yet) is returned as-is, like `readline` on a file
    /// that is still being written.
    pub fn read_line(
        &self,
        user: UserId,
        job: JobId,
        kind: StreamKind,
        path: &Path,
    ) -> std::io::Result<Option<String>> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(user).or_default();
        let cursor = session.cursor((job, kind), path);

        let file = match std::fs::File::open(&cursor.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(cursor.offset))?;

        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line)?;
        if line.is_empty() {
            return Ok(None);
        }
        cursor.offset += line.len() as u64;
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Drop all cursors for a job (called on dispose).
    pub fn forget_job(&self, user: UserId, job: JobId) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&user) {
            session.cursors.retain(|(j, _), _| *j != job);
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
