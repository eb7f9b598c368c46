// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use crate::types::{ExitInfoEntry, JobEntry, TransferEntry, WorkflowEntry};
use gm_core::{ErrorKind, JobId, JobStatus, TransferId, UserId, WorkflowId, WorkflowStatus};
use serde::{Deserialize, Serialize};

/// Response from the daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Health check reply
    Pong,

    /// Generic success for control operations
    Ok,

    /// Login bound to this user id
    Registered { user: UserId },

    JobSubmitted { id: JobId },

    WorkflowSubmitted { id: WorkflowId },

    Jobs { jobs: Vec<JobEntry> },

    Workflows { workflows: Vec<WorkflowEntry> },

    JobStatus { status: JobStatus },

    WorkflowStatus { status: WorkflowStatus },

    /// Exit information; `None` while the job is still live
    ExitInfo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit: Option<ExitInfoEntry>,
    },

    /// Next stdio line; `None` at end of stream
    Line {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<String>,
    },

    /// Whether every awaited job was terminal when the call returned
    WaitDone { all_terminal: bool },

    TransferRegistered { server_path: TransferId },

    /// A chunk of transfer bytes; empty at end of file
    Bytes { bytes: Vec<u8> },

    Transfers { transfers: Vec<TransferEntry> },

    TransferInfo { info: TransferEntry },

    /// Operation failed with a typed reason
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind, message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
