// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Materialized state from WAL replay.
//!
//! State is derived from events (see [`gm_core::Event`]); every handler in
//! the submodules MUST be idempotent, because events are applied once when
//! committed and again during WAL replay after a restart. Guidelines:
//! use assignment over mutation, guard inserts with existence checks, and
//! treat set operations (`insert`/`remove` on refs) as naturally idempotent.

mod jobs;
mod transfers;
mod users;
mod workflows;

use gm_core::{
    Event, Job, JobId, Temporary, TemporaryId, Transfer, TransferId, User, UserId, Workflow,
    WorkflowId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized state built from WAL events.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub users: HashMap<UserId, User>,
    /// login → user id, for idempotent registration
    #[serde(default)]
    pub logins: HashMap<String, UserId>,
    pub jobs: HashMap<JobId, Job>,
    pub workflows: HashMap<WorkflowId, Workflow>,
    pub transfers: HashMap<TransferId, Transfer>,
    #[serde(default)]
    pub temporaries: HashMap<TemporaryId, Temporary>,
}

impl MaterializedState {
    /// Apply an event to derive state changes. Handlers must be idempotent.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::UserRegistered { .. } => users::apply(self, event),

            Event::JobCreated { .. }
            | Event::JobStdioAllocated { .. }
            | Event::JobSubmitted { .. }
            | Event::JobStatusChanged { .. }
            | Event::JobFailed { .. }
            | Event::JobExitRecorded { .. }
            | Event::JobDisposed { .. } => jobs::apply(self, event),

            Event::WorkflowCreated { .. }
            | Event::WorkflowStatusChanged { .. }
            | Event::WorkflowDisposed { .. } => workflows::apply(self, event),

            Event::TransferRegistered { .. }
            | Event::TransferStatusChanged { .. }
            | Event::TransferExpirationSet { .. }
            | Event::TransferSwept { .. }
            | Event::TemporaryRegistered { .. }
            | Event::TemporaryAllocated { .. }
            | Event::TemporaryRemoved { .. } => transfers::apply(self, event),

            // Clean-shutdown marker; no state change
            Event::Shutdown => {}
        }
    }

    /// The workflow a job belongs to, if any.
    pub fn workflow_of(&self, job: &Job) -> Option<&Workflow> {
        job.workflow_id.and_then(|id| self.workflows.get(&id))
    }

    /// Predecessor job ids of `job` within its workflow.
    pub fn predecessors(&self, job: &Job) -> Vec<JobId> {
        self.workflow_of(job)
            .map(|wf| wf.predecessors_of(job.id).collect())
            .unwrap_or_default()
    }

    /// Successor job ids of `job` within its workflow.
    pub fn successors(&self, job: &Job) -> Vec<JobId> {
        self.workflow_of(job)
            .map(|wf| wf.successors_of(job.id).collect())
            .unwrap_or_default()
    }

    /// Jobs owned by `user`, in unspecified order.
    pub fn user_jobs(&self, user: UserId) -> Vec<&Job> {
        self.jobs.values().filter(|j| j.user_id == user).collect()
    }

    /// Workflows owned by `user`, in unspecified order.
    pub fn user_workflows(&self, user: UserId) -> Vec<&Workflow> {
        self.workflows.values().filter(|w| w.user_id == user).collect()
    }

    /// Transfers owned by `user`, in unspecified order.
    pub fn user_transfers(&self, user: UserId) -> Vec<&Transfer> {
        self.transfers.values().filter(|t| t.user_id == user).collect()
    }

    /// Live jobs referencing the given transfer.
    pub fn jobs_referencing(&self, transfer: &TransferId) -> Vec<JobId> {
        self.transfers
            .get(transfer)
            .map(|t| t.refs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Non-terminal jobs with a recorded DRM id (restart reconciliation).
    pub fn in_flight_jobs(&self) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|j| !j.is_terminal() && j.drm_id.is_some())
            .collect()
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
