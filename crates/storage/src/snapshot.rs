// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Zstd-compressed state snapshots.
//!
//! A snapshot captures the materialized state as of a WAL sequence number.
//! On startup the newest valid snapshot is loaded and only the WAL tail
//! past `processed_seq` is replayed.

use crate::state::MaterializedState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Bump when the persisted shape changes incompatibly.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// Errors from snapshot save/load.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("snapshot decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unsupported snapshot version {found} (current is {CURRENT_SNAPSHOT_VERSION})")]
    Version { found: u32 },
}

/// On-disk snapshot envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// WAL sequence captured by this snapshot
    pub processed_seq: u64,
    pub state: MaterializedState,
}

impl Snapshot {
    pub fn new(processed_seq: u64, state: MaterializedState) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, processed_seq, state }
    }

    /// Write atomically: serialize to a sibling temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec(self).map_err(SnapshotError::Encode)?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &compressed)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot; `Ok(None)` when none exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let compressed = fs::read(path)?;
        let json = zstd::decode_all(compressed.as_slice())?;
        let snapshot: Snapshot =
            serde_json::from_slice(&json).map_err(SnapshotError::Decode)?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::Version { found: snapshot.version });
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
