// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! User registration event handler.

use gm_core::{Event, User};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    if let Event::UserRegistered { id, login, registered_at_ms } = event {
        // First registration wins; replays and duplicate logins are no-ops
        if state.logins.contains_key(login) {
            return;
        }
        state.logins.insert(login.clone(), *id);
        state.users.insert(
            *id,
            User { id: *id, login: login.clone(), registered_at_ms: *registered_at_ms },
        );
    }
}
