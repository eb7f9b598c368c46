// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Typed error kinds returned to clients.

use serde::{Deserialize, Serialize};

/// Short, typed reason attached to every error surfaced to a caller.
///
/// Ownership violations are always reported as `Unauthorized` without
/// revealing whether the target entity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Acting user does not own the target entity
    Unauthorized,
    /// Entity id unknown
    NotFound,
    /// Empty command, malformed dependency, unknown symbolic path
    InvalidArgument,
    /// Dependency graph has a cycle after group expansion
    WorkflowCyclic,
    /// Missing shared-resource translation
    ConfigurationError,
    /// DRM adapter failed after bounded retries
    DrmUnavailable,
    /// DRM rejected the template
    SubmissionError,
    /// Predecessor terminal-non-DONE
    UpstreamFailed,
    /// Transfer read/write in an incompatible state
    TransferConflict,
    /// Unexpected condition in the engine or store
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::status::display_wire_name(self, f)
    }
}
