// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Events persisted to the write-ahead log.
//!
//! State is derived from events: the store appends an event, then applies
//! it to the materialized state. Every applier must be idempotent —
//! applying the same event twice must produce the same state as applying
//! it once, because events are re-applied during WAL replay after restart.

use crate::job::{Job, JobId, WorkflowId};
use crate::status::{ExitInfo, FailureCause, JobStatus, TransferStatus, WorkflowStatus};
use crate::token::{TemporaryId, TransferId};
use crate::transfer::{Temporary, Transfer};
use crate::user::UserId;
use crate::workflow::Workflow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A fact recorded in the WAL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A login was bound to a fresh user id
    UserRegistered { id: UserId, login: String, registered_at_ms: u64 },

    /// A job entered the store (standalone or as a workflow member)
    JobCreated { job: Box<Job> },

    /// Service-owned stdio files were allocated ahead of DRM submission
    JobStdioAllocated { id: JobId, stdout: PathBuf, stderr: Option<PathBuf> },

    /// The DRM accepted the job
    JobSubmitted { id: JobId, drm_id: String, submitted_at_ms: u64 },

    /// DRM-side or engine-side status movement
    JobStatusChanged { id: JobId, status: JobStatus },

    /// The job failed without (or before) a DRM verdict
    JobFailed { id: JobId, cause: FailureCause },

    /// Terminal bookkeeping from the DRM wait call
    JobExitRecorded { id: JobId, exit: ExitInfo },

    /// The job and its resources left the store
    JobDisposed { id: JobId },

    /// A workflow entered the store together with its member jobs and
    /// declared temporaries — one entry so replay never observes a
    /// partially-created workflow
    WorkflowCreated {
        workflow: Box<Workflow>,
        jobs: Vec<Job>,
        #[serde(default)]
        temporaries: Vec<Temporary>,
    },

    WorkflowStatusChanged { id: WorkflowId, status: WorkflowStatus },

    WorkflowDisposed { id: WorkflowId },

    /// A client registered a transfer and was handed the server path
    TransferRegistered { transfer: Box<Transfer> },

    TransferStatusChanged { id: TransferId, status: TransferStatus },

    /// Expiration moved (cancel sets it to "now")
    TransferExpirationSet { id: TransferId, expires_at: DateTime<Utc> },

    /// The sweeper deleted the server-side bytes and dropped the record
    TransferSwept { id: TransferId },

    /// A workflow declared a temporary path
    TemporaryRegistered { temporary: Temporary },

    /// The resolver allocated the concrete scratch path at first use
    TemporaryAllocated { id: TemporaryId, concrete_path: PathBuf },

    /// Last referencing job disposed; the record is gone
    TemporaryRemoved { id: TemporaryId },

    /// Clean daemon shutdown marker
    Shutdown,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
