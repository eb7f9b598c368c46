// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Summary DTOs carried in responses.

use chrono::{DateTime, Utc};
use gm_core::{
    ExitStatus, Job, JobId, JobStatus, Transfer, TransferId, TransferStatus, UserId, Workflow,
    WorkflowId, WorkflowStatus,
};
use serde::{Deserialize, Serialize};

/// One job in a `ListJobs` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub priority: i32,
    #[serde(default)]
    pub barrier: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drm_id: Option<String>,
    pub created_at_ms: u64,
    pub expires_at: DateTime<Utc>,
}

impl From<&Job> for JobEntry {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            status: job.status,
            priority: job.priority,
            barrier: job.barrier,
            workflow_id: job.workflow_id,
            drm_id: job.drm_id.clone(),
            created_at_ms: job.created_at_ms,
            expires_at: job.expires_at,
        }
    }
}

/// One workflow in a `ListWorkflows` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEntry {
    pub id: WorkflowId,
    pub name: String,
    pub status: WorkflowStatus,
    pub job_ids: Vec<JobId>,
    pub created_at_ms: u64,
    pub expires_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowEntry {
    fn from(wf: &Workflow) -> Self {
        Self {
            id: wf.id,
            name: wf.name.clone(),
            status: wf.status,
            job_ids: wf.job_ids.clone(),
            created_at_ms: wf.created_at_ms,
            expires_at: wf.expires_at,
        }
    }
}

/// One transfer in `ListTransfers` / `TransferInfo` responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub server_path: TransferId,
    pub user: UserId,
    pub client_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_paths: Option<Vec<String>>,
    pub status: TransferStatus,
    pub expires_at: DateTime<Utc>,
}

impl From<&Transfer> for TransferEntry {
    fn from(t: &Transfer) -> Self {
        Self {
            server_path: t.id.clone(),
            user: t.user_id,
            client_path: t.client_path.clone(),
            client_paths: t.client_paths.clone(),
            status: t.status,
            expires_at: t.expires_at,
        }
    }
}

/// `(exit_status, exit_value, terminating_signal)` as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitInfoEntry {
    pub exit_status: ExitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_value: Option<i32>,
    /// Signal name when terminated by signal, else empty
    #[serde(default)]
    pub terminating_signal: String,
}

impl From<&gm_core::ExitInfo> for ExitInfoEntry {
    fn from(exit: &gm_core::ExitInfo) -> Self {
        Self {
            exit_status: exit.exit_status,
            exit_value: exit.exit_value,
            terminating_signal: exit.terminating_signal.clone(),
        }
    }
}
