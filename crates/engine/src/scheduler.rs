// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Pure scheduling decisions over the materialized state.
//!
//! The engine tick applies these in order: barrier/upstream propagation
//! first (it can unblock or doom other jobs), then dispatch selection.

use gm_core::{Job, JobId, JobStatus, TransferStatus, UserId, Workflow, WorkflowStatus};
use gm_storage::MaterializedState;
use std::collections::HashMap;

/// Terminal-or-missing view of one predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredState {
    Done,
    /// Failed, killed, or disposed while non-terminal
    Doomed,
    Live,
}

fn pred_state(state: &MaterializedState, id: JobId) -> PredState {
    match state.jobs.get(&id) {
        // A disposed predecessor can never complete
        None => PredState::Doomed,
        Some(job) => match job.status {
            JobStatus::Done => PredState::Done,
            JobStatus::Failed | JobStatus::Killed => PredState::Doomed,
            _ => PredState::Live,
        },
    }
}

/// Jobs that should transition without ever reaching the DRM:
/// barriers whose predecessors settled, and jobs doomed by an upstream
/// failure.
#[derive(Debug, Default, PartialEq)]
pub struct Propagation {
    /// Barrier jobs whose predecessors are all DONE
    pub barriers_done: Vec<JobId>,
    /// Jobs (barrier or not) with a terminal-non-DONE predecessor
    pub upstream_failed: Vec<JobId>,
}

/// One propagation step. Callers iterate to a fixpoint: completing a
/// barrier can settle the next barrier downstream.
pub fn propagate(state: &MaterializedState) -> Propagation {
    let mut result = Propagation::default();
    for job in state.jobs.values() {
        if job.status != JobStatus::Pending {
            continue;
        }
        let preds = state.predecessors(job);
        if preds.is_empty() && job.barrier {
            // A barrier with no predecessors has nothing to wait for
            result.barriers_done.push(job.id);
            continue;
        }
        let mut all_done = !preds.is_empty();
        let mut doomed = false;
        for pred in preds {
            match pred_state(state, pred) {
                PredState::Done => {}
                PredState::Doomed => doomed = true,
                PredState::Live => all_done = false,
            }
        }
        if doomed {
            result.upstream_failed.push(job.id);
        } else if all_done && job.barrier {
            result.barriers_done.push(job.id);
        }
    }
    result.barriers_done.sort();
    result.upstream_failed.sort();
    result
}

/// Every input transfer has compute-side bytes.
fn inputs_staged(state: &MaterializedState, job: &Job) -> bool {
    job.referenced_inputs.iter().all(|id| {
        state
            .transfers
            .get(id)
            .map(|t| {
                matches!(
                    t.status,
                    TransferStatus::OnCompute | TransferStatus::ReadyToTransferBack
                )
            })
            .unwrap_or(false)
    })
}

/// Non-barrier jobs ready for the DRM: `Pending`, every predecessor
/// `Done`, and every input transfer staged. Ordered by priority (higher
/// first), then submission timestamp, then id — deterministic for equal
/// keys.
pub fn ready_jobs(state: &MaterializedState) -> Vec<Job> {
    let mut ready: Vec<Job> = state
        .jobs
        .values()
        .filter(|job| {
            job.status == JobStatus::Pending
                && !job.barrier
                && state
                    .predecessors(job)
                    .iter()
                    .all(|p| pred_state(state, *p) == PredState::Done)
                && inputs_staged(state, job)
        })
        .cloned()
        .collect();
    ready.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at_ms.cmp(&b.created_at_ms))
            .then(a.id.cmp(&b.id))
    });
    ready
}

/// Ready jobs that fit under the per-user in-DRM cap. Excess jobs stay
/// `Pending` until slots free up.
pub fn select_for_dispatch(state: &MaterializedState, max_in_drm_per_user: usize) -> Vec<Job> {
    let mut in_drm: HashMap<UserId, usize> = HashMap::new();
    for job in state.jobs.values() {
        if job.status.is_in_drm() {
            *in_drm.entry(job.user_id).or_insert(0) += 1;
        }
    }

    let mut selected = Vec::new();
    for job in ready_jobs(state) {
        let used = in_drm.entry(job.user_id).or_insert(0);
        if *used < max_in_drm_per_user {
            *used += 1;
            selected.push(job);
        }
    }
    selected
}

/// Derive a workflow's status from its member jobs.
///
/// Disposed members are ignored; a workflow whose members were all
/// disposed counts as done.
pub fn workflow_status(state: &MaterializedState, workflow: &Workflow) -> WorkflowStatus {
    if workflow.status == WorkflowStatus::DeletePending {
        return WorkflowStatus::DeletePending;
    }
    let jobs: Vec<&Job> =
        workflow.job_ids.iter().filter_map(|id| state.jobs.get(id)).collect();

    let all_terminal = jobs.iter().all(|j| j.is_terminal());
    if all_terminal {
        if jobs.iter().any(|j| j.status != JobStatus::Done) {
            return WorkflowStatus::Failed;
        }
        return WorkflowStatus::Done;
    }
    if jobs.iter().any(|j| j.status.is_in_drm()) {
        return WorkflowStatus::Active;
    }
    WorkflowStatus::Submitted
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
