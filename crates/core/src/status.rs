// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Job, workflow, and transfer status lattices.
//!
//! Every status displays as its serde wire name (snake_case), through
//! [`display_wire_name`] — logs and protocol payloads always agree on
//! spelling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Write a unit enum's serde name. Shared by the `Display` impls of the
/// status types here and in sibling modules.
pub(crate) fn display_wire_name<T: Serialize>(
    value: &T,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => f.write_str(&name),
        _ => Err(fmt::Error),
    }
}

/// Lifecycle status of a job.
///
/// `NotSubmitted → Pending → QueuedActive → Running → {Done, Failed, Killed}`,
/// with the hold/suspend side states surfaced from the DRM in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet handed to the scheduler (workflow jobs before registration)
    NotSubmitted,
    /// Registered with the engine, waiting for predecessors or for a DRM slot
    Pending,
    /// Submitted to the DRM, waiting in a queue
    QueuedActive,
    SystemOnHold,
    UserOnHold,
    UserSystemOnHold,
    Running,
    SystemSuspended,
    UserSuspended,
    UserSystemSuspended,
    Done,
    Failed,
    Killed,
    /// DRM could not report a status
    Undetermined,
}

impl JobStatus {
    /// Terminal states: the job will never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Killed)
    }

    /// True when the job occupies a DRM slot (counts against the in-DRM cap).
    pub fn is_in_drm(&self) -> bool {
        matches!(
            self,
            JobStatus::QueuedActive
                | JobStatus::SystemOnHold
                | JobStatus::UserOnHold
                | JobStatus::UserSystemOnHold
                | JobStatus::Running
                | JobStatus::SystemSuspended
                | JobStatus::UserSuspended
                | JobStatus::UserSystemSuspended
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_wire_name(self, f)
    }
}

/// Why a job ended up in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// A predecessor finished terminal-non-DONE; the job was never submitted
    UpstreamFailed,
    /// The DRM rejected the template
    SubmissionError,
    /// The DRM adapter kept failing after bounded retries
    DrmUnavailable,
    /// The DRM reported the job itself as failed
    DrmFailed,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_wire_name(self, f)
    }
}

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    NotSubmitted,
    Submitted,
    /// At least one job queued or running
    Active,
    /// All jobs DONE
    Done,
    /// At least one job terminal-non-DONE and nothing left to run
    Failed,
    DeletePending,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Done | WorkflowStatus::Failed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_wire_name(self, f)
    }
}

/// Where a transfer's bytes currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    DoesNotExist,
    OnClient,
    Transferring,
    OnCompute,
    ReadyToTransferBack,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_wire_name(self, f)
    }
}

/// DRMAA-style classification of how a job terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    FinishedRegularly,
    FinishedTermSig,
    FinishedUnclearConditions,
    Aborted,
    ExitUndetermined,
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_wire_name(self, f)
    }
}

/// Exit information recorded when a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    pub exit_status: ExitStatus,
    /// Process exit code, when the job finished regularly
    pub exit_value: Option<i32>,
    /// Signal name when terminated by signal, else empty
    #[serde(default)]
    pub terminating_signal: String,
    /// DRM-reported resource usage (name → value)
    #[serde(default)]
    pub resource_usage: HashMap<String, String>,
}

impl ExitInfo {
    /// Exit info for a regular termination with the given exit code.
    pub fn finished(exit_value: i32) -> Self {
        Self {
            exit_status: ExitStatus::FinishedRegularly,
            exit_value: Some(exit_value),
            terminating_signal: String::new(),
            resource_usage: HashMap::new(),
        }
    }

    /// Exit info for a signal-terminated job.
    pub fn signalled(signal: impl Into<String>) -> Self {
        Self {
            exit_status: ExitStatus::FinishedTermSig,
            exit_value: None,
            terminating_signal: signal.into(),
            resource_usage: HashMap::new(),
        }
    }

    /// Exit info for a job aborted before or during execution.
    pub fn aborted() -> Self {
        Self {
            exit_status: ExitStatus::Aborted,
            exit_value: None,
            terminating_signal: String::new(),
            resource_usage: HashMap::new(),
        }
    }

    pub fn undetermined() -> Self {
        Self {
            exit_status: ExitStatus::ExitUndetermined,
            exit_value: None,
            terminating_signal: String::new(),
            resource_usage: HashMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
