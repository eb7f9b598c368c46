// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Transfer and temporary-path entities.

use crate::job::JobId;
use crate::status::TransferStatus;
use crate::token::{TemporaryId, TransferId};
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Direction of a transfer at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Client → compute; bytes exist on the client at registration
    In,
    /// Compute → client; the job creates the server-side file
    Out,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::status::display_wire_name(self, f)
    }
}

/// Binding between a client-side path and a service-owned server path.
///
/// The server path is the primary key. `client_paths` is set for
/// multi-file formats; the server path is then a directory and the
/// associated files live inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub user_id: UserId,
    pub client_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_paths: Option<Vec<String>>,
    pub direction: TransferDirection,
    pub status: TransferStatus,
    /// Past this instant, and with no live references, the sweeper deletes
    /// the server-side bytes
    pub expires_at: DateTime<Utc>,
    pub registered_at_ms: u64,
    /// Live job references; maintained by the store from job create/dispose
    #[serde(default)]
    pub refs: BTreeSet<JobId>,
}

impl Transfer {
    /// Initial status for a freshly registered transfer.
    pub fn initial_status(direction: TransferDirection) -> TransferStatus {
        match direction {
            TransferDirection::In => TransferStatus::OnClient,
            TransferDirection::Out => TransferStatus::DoesNotExist,
        }
    }

    /// The server path names a directory rather than a single file.
    pub fn is_directory(&self) -> bool {
        self.client_paths.is_some()
    }

    pub fn is_referenced(&self) -> bool {
        !self.refs.is_empty()
    }
}

/// Service-owned scratch path whose concrete name is created lazily when
/// first referenced by a submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temporary {
    pub id: TemporaryId,
    pub user_id: UserId,
    pub is_directory: bool,
    /// Appended to the generated name (e.g. ".nii.gz")
    #[serde(default)]
    pub suffix: String,
    /// Allocated by the resolver at first use; stable afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete_path: Option<PathBuf>,
    pub disposal_hours: u32,
    /// Live job references; maintained by the store from job create/dispose
    #[serde(default)]
    pub refs: BTreeSet<JobId>,
}

/// Client-side declaration of a temporary, carried inside a workflow spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryDecl {
    pub id: TemporaryId,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "crate::job::default_disposal_hours")]
    pub disposal_hours: u32,
}

impl TemporaryDecl {
    pub fn file(suffix: impl Into<String>) -> Self {
        Self {
            id: TemporaryId::new(),
            is_directory: false,
            suffix: suffix.into(),
            disposal_hours: crate::job::DEFAULT_DISPOSAL_HOURS,
        }
    }

    pub fn directory() -> Self {
        Self {
            id: TemporaryId::new(),
            is_directory: true,
            suffix: String::new(),
            disposal_hours: crate::job::DEFAULT_DISPOSAL_HOURS,
        }
    }
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
