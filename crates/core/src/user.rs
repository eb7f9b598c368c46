// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! User identity.
//!
//! A user is bound to an OS login at first registration. Every other entity
//! carries an owner `UserId`, and ownership checks gate every store and
//! engine operation.

use serde::{Deserialize, Serialize};

crate::entity_id! {
    /// Opaque internal user identifier.
    pub struct UserId("usr-");
}

/// Registered user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// OS login captured at first registration
    pub login: String,
    pub registered_at_ms: u64,
}
