// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Workflow lifecycle event handlers.

use gm_core::Event;

use super::{jobs, MaterializedState};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::WorkflowCreated { workflow, jobs, temporaries } => {
            if state.workflows.contains_key(&workflow.id) {
                return;
            }
            for temporary in temporaries {
                state.temporaries.entry(temporary.id).or_insert_with(|| temporary.clone());
            }
            for job in jobs {
                jobs::insert_job(state, job);
            }
            state.workflows.insert(workflow.id, (**workflow).clone());
        }

        Event::WorkflowStatusChanged { id, status } => {
            if let Some(wf) = state.workflows.get_mut(id) {
                wf.status = *status;
            }
        }

        // Member jobs are disposed through their own JobDisposed events
        Event::WorkflowDisposed { id } => {
            state.workflows.remove(id);
        }

        _ => {}
    }
}
