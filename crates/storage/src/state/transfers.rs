// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Transfer and temporary-path event handlers.

use gm_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::TransferRegistered { transfer } => {
            if !state.transfers.contains_key(&transfer.id) {
                state.transfers.insert(transfer.id.clone(), (**transfer).clone());
            }
        }

        Event::TransferStatusChanged { id, status } => {
            if let Some(t) = state.transfers.get_mut(id) {
                t.status = *status;
            }
        }

        Event::TransferExpirationSet { id, expires_at } => {
            if let Some(t) = state.transfers.get_mut(id) {
                t.expires_at = *expires_at;
            }
        }

        Event::TransferSwept { id } => {
            state.transfers.remove(id);
        }

        Event::TemporaryRegistered { temporary } => {
            if !state.temporaries.contains_key(&temporary.id) {
                state.temporaries.insert(temporary.id, temporary.clone());
            }
        }

        Event::TemporaryAllocated { id, concrete_path } => {
            if let Some(t) = state.temporaries.get_mut(id) {
                t.concrete_path = Some(concrete_path.clone());
            }
        }

        Event::TemporaryRemoved { id } => {
            state.temporaries.remove(id);
        }

        _ => {}
    }
}
