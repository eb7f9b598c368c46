// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use gm_core::{JobId, JobSpec, TransferDirection, TransferId, UserId, WorkflowId, WorkflowSpec};
use serde::{Deserialize, Serialize};

/// Request from a client to the daemon.
///
/// `RegisterUser` binds the caller's OS login to a user id; every other
/// request carries that id, and the daemon rejects operations on entities
/// the user does not own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Bind an OS login to a user id (idempotent per login)
    RegisterUser { login: String },

    /// Submit a standalone job
    SubmitJob { user: UserId, spec: JobSpec },

    /// Submit a workflow of jobs with dependencies and groups
    SubmitWorkflow { user: UserId, spec: WorkflowSpec },

    /// Ids and summary data of the user's live jobs
    ListJobs { user: UserId },

    /// Ids and summary data of the user's live workflows
    ListWorkflows { user: UserId },

    /// Lifecycle status of one job
    JobStatus { user: UserId, id: JobId },

    /// Derived status of one workflow
    WorkflowStatus { user: UserId, id: WorkflowId },

    /// `(exit_status, exit_value, terminating_signal)` of a terminal job
    ExitInfo { user: UserId, id: JobId },

    /// Next line of the job's standard output (incremental per session)
    StdoutReadLine { user: UserId, id: JobId },

    /// Next line of the job's standard error
    StderrReadLine { user: UserId, id: JobId },

    /// Block until the named jobs are terminal or the deadline elapses.
    /// Negative timeout waits forever; zero polls and returns.
    Wait { user: UserId, ids: Vec<JobId>, timeout_secs: i64 },

    /// Hold a queued job / suspend a running one
    Stop { user: UserId, id: JobId },

    /// Release a stopped job
    Restart { user: UserId, id: JobId },

    /// Terminate a job; it stays visible until disposed
    Kill { user: UserId, id: JobId },

    /// Kill if needed, then remove the job and release its resources
    Dispose { user: UserId, id: JobId },

    /// Cancel all non-terminal member jobs, then remove the workflow
    DisposeWorkflow { user: UserId, id: WorkflowId },

    /// Allocate a server path for a client file (or file set)
    RegisterTransfer {
        user: UserId,
        client_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_paths: Option<Vec<String>>,
        direction: TransferDirection,
        disposal_hours: u32,
    },

    /// Append a chunk to the server-side file; `eof` closes the stream
    TransferWrite { user: UserId, server_path: TransferId, bytes: Vec<u8>, eof: bool },

    /// Read up to `max_len` bytes starting at `offset`
    TransferRead { user: UserId, server_path: TransferId, offset: u64, max_len: usize },

    /// Move the transfer's expiration to now
    CancelTransfer { user: UserId, server_path: TransferId },

    /// The user's registered transfers
    ListTransfers { user: UserId },

    /// `(server_path, client_path, expiration)` for one transfer
    TransferInfo { user: UserId, server_path: TransferId },

    /// Request daemon shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
