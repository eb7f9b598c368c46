// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! gm-wire: IPC protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod request;
mod response;
mod types;
mod wire;

pub use request::Request;
pub use response::Response;
pub use types::{ExitInfoEntry, JobEntry, TransferEntry, WorkflowEntry};
pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    MAX_FRAME,
};
