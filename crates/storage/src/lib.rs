// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gm-storage: WAL-backed persistent state store for Gridmill

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{Store, StoreError};
pub use wal::{Wal, WalEntry, WalError};
