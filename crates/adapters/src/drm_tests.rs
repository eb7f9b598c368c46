// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use super::*;
use yare::parameterized;

#[parameterized(
    done = { DrmStatus::Done, true },
    failed = { DrmStatus::Failed, true },
    queued = { DrmStatus::QueuedActive, false },
    running = { DrmStatus::Running, false },
    held = { DrmStatus::UserOnHold, false },
    undetermined = { DrmStatus::Undetermined, false },
)]
fn terminal_statuses(status: DrmStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn drm_status_maps_onto_job_status() {
    assert_eq!(JobStatus::from(DrmStatus::Running), JobStatus::Running);
    assert_eq!(JobStatus::from(DrmStatus::QueuedActive), JobStatus::QueuedActive);
    assert_eq!(JobStatus::from(DrmStatus::Done), JobStatus::Done);
    assert_eq!(JobStatus::from(DrmStatus::UserSystemSuspended), JobStatus::UserSystemSuspended);
}

#[test]
fn only_unavailable_is_transient() {
    assert!(DrmError::Unavailable("down".into()).is_transient());
    assert!(!DrmError::Rejected("bad".into()).is_transient());
    assert!(!DrmError::UnknownId("x".into()).is_transient());
    assert!(!DrmError::WaitTimeout.is_transient());
}
