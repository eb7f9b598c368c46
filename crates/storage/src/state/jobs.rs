// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Job lifecycle event handlers.

use gm_core::{Event, JobStatus};

use super::MaterializedState;

/// Insert a job and acquire its live transfer/temporary references.
///
/// Set inserts are idempotent, so replay self-heals the refcounts.
pub(crate) fn insert_job(state: &mut MaterializedState, job: &gm_core::Job) {
    if !state.jobs.contains_key(&job.id) {
        state.jobs.insert(job.id, job.clone());
    }
    for tid in job.referenced_transfers() {
        if let Some(t) = state.transfers.get_mut(&tid) {
            t.refs.insert(job.id);
        }
    }
    for tmp in job.referenced_temporaries() {
        if let Some(t) = state.temporaries.get_mut(&tmp) {
            t.refs.insert(job.id);
        }
    }
}

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::JobCreated { job } => insert_job(state, job),

        Event::JobStdioAllocated { id, stdout, stderr } => {
            if let Some(job) = state.jobs.get_mut(id) {
                job.stdout_path = Some(stdout.clone());
                job.stderr_path = stderr.clone();
            }
        }

        Event::JobSubmitted { id, drm_id, submitted_at_ms } => {
            if let Some(job) = state.jobs.get_mut(id) {
                job.drm_id = Some(drm_id.clone());
                job.submitted_at_ms = Some(*submitted_at_ms);
                if !job.status.is_terminal() {
                    job.status = JobStatus::QueuedActive;
                }
            }
        }

        Event::JobStatusChanged { id, status } => {
            if let Some(job) = state.jobs.get_mut(id) {
                job.status = *status;
            }
        }

        Event::JobFailed { id, cause } => {
            if let Some(job) = state.jobs.get_mut(id) {
                job.status = JobStatus::Failed;
                job.failure_cause = Some(*cause);
            }
        }

        Event::JobExitRecorded { id, exit } => {
            if let Some(job) = state.jobs.get_mut(id) {
                job.exit = Some(exit.clone());
            }
        }

        Event::JobDisposed { id } => {
            state.jobs.remove(id);
            // Release live references; the sweeper owns actual deletion.
            for transfer in state.transfers.values_mut() {
                transfer.refs.remove(id);
            }
            for temporary in state.temporaries.values_mut() {
                temporary.refs.remove(id);
            }
        }

        _ => {}
    }
}
