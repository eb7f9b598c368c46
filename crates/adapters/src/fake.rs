// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Fake DRM adapter for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::drm::{DrmAdapter, DrmError, DrmStatus, DrmTemplate};
use async_trait::async_trait;
use gm_core::ExitInfo;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Recorded call to [`FakeDrm`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrmCall {
    Submit { name: String },
    Status { drm_id: String },
    Hold { drm_id: String },
    Release { drm_id: String },
    Kill { drm_id: String },
    Wait { drm_id: String },
}

struct FakeJob {
    template: DrmTemplate,
    status: DrmStatus,
    exit: Option<ExitInfo>,
}

struct FakeState {
    next_id: u64,
    jobs: HashMap<String, FakeJob>,
    templates: Vec<DrmTemplate>,
    calls: Vec<DrmCall>,
    submit_errors: VecDeque<DrmError>,
    status_errors: VecDeque<DrmError>,
    /// When set, submissions complete immediately with exit code 0
    auto_complete: bool,
}

/// Fake DRM for testing.
///
/// Records every call, lets tests drive status transitions explicitly, and
/// can be primed with errors to exercise the engine's retry paths.
#[derive(Clone)]
pub struct FakeDrm {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeDrm {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDrm {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                next_id: 0,
                jobs: HashMap::new(),
                templates: Vec::new(),
                calls: Vec::new(),
                submit_errors: VecDeque::new(),
                status_errors: VecDeque::new(),
                auto_complete: false,
            })),
        }
    }

    /// Fake where every submission immediately finishes with exit code 0.
    pub fn auto_completing() -> Self {
        let fake = Self::new();
        fake.inner.lock().auto_complete = true;
        fake
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<DrmCall> {
        self.inner.lock().calls.clone()
    }

    /// Templates submitted so far, in submission order.
    pub fn submitted_templates(&self) -> Vec<DrmTemplate> {
        self.inner.lock().templates.clone()
    }

    pub fn submitted_count(&self) -> usize {
        self.inner.lock().templates.len()
    }

    /// Drive a job to a new status.
    pub fn set_status(&self, drm_id: &str, status: DrmStatus) {
        if let Some(job) = self.inner.lock().jobs.get_mut(drm_id) {
            job.status = status;
        }
    }

    /// Terminate a job with the given exit information.
    pub fn complete(&self, drm_id: &str, exit: ExitInfo) {
        if let Some(job) = self.inner.lock().jobs.get_mut(drm_id) {
            job.status = match (&exit.exit_status, exit.exit_value) {
                (gm_core::ExitStatus::FinishedRegularly, Some(0)) => DrmStatus::Done,
                _ => DrmStatus::Failed,
            };
            job.exit = Some(exit);
        }
    }

    /// Queue an error for the next `submit` call.
    pub fn push_submit_error(&self, error: DrmError) {
        self.inner.lock().submit_errors.push_back(error);
    }

    /// Queue an error for the next `status` call.
    pub fn push_status_error(&self, error: DrmError) {
        self.inner.lock().status_errors.push_back(error);
    }
}

#[async_trait]
impl DrmAdapter for FakeDrm {
    async fn submit(&self, template: DrmTemplate) -> Result<String, DrmError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DrmCall::Submit { name: template.name.clone() });
        if let Some(err) = inner.submit_errors.pop_front() {
            return Err(err);
        }
        inner.next_id += 1;
        let id = format!("drm-{}", inner.next_id);
        let (status, exit) = if inner.auto_complete {
            (DrmStatus::Done, Some(ExitInfo::finished(0)))
        } else {
            (DrmStatus::QueuedActive, None)
        };
        inner.templates.push(template.clone());
        inner.jobs.insert(id.clone(), FakeJob { template, status, exit });
        Ok(id)
    }

    async fn status(&self, drm_id: &str) -> Result<DrmStatus, DrmError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DrmCall::Status { drm_id: drm_id.to_string() });
        if let Some(err) = inner.status_errors.pop_front() {
            return Err(err);
        }
        inner
            .jobs
            .get(drm_id)
            .map(|j| j.status)
            .ok_or_else(|| DrmError::UnknownId(drm_id.to_string()))
    }

    async fn hold(&self, drm_id: &str) -> Result<(), DrmError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DrmCall::Hold { drm_id: drm_id.to_string() });
        match inner.jobs.get_mut(drm_id) {
            Some(job) => {
                if job.status == DrmStatus::QueuedActive {
                    job.status = DrmStatus::UserOnHold;
                } else if job.status == DrmStatus::Running {
                    job.status = DrmStatus::UserSuspended;
                }
                Ok(())
            }
            None => Err(DrmError::UnknownId(drm_id.to_string())),
        }
    }

    async fn release(&self, drm_id: &str) -> Result<(), DrmError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DrmCall::Release { drm_id: drm_id.to_string() });
        match inner.jobs.get_mut(drm_id) {
            Some(job) => {
                if job.status == DrmStatus::UserOnHold {
                    job.status = DrmStatus::QueuedActive;
                } else if job.status == DrmStatus::UserSuspended {
                    job.status = DrmStatus::Running;
                }
                Ok(())
            }
            None => Err(DrmError::UnknownId(drm_id.to_string())),
        }
    }

    async fn kill(&self, drm_id: &str) -> Result<(), DrmError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DrmCall::Kill { drm_id: drm_id.to_string() });
        match inner.jobs.get_mut(drm_id) {
            Some(job) => {
                if !job.status.is_terminal() {
                    job.status = DrmStatus::Failed;
                    job.exit = Some(ExitInfo::aborted());
                }
                Ok(())
            }
            None => Err(DrmError::UnknownId(drm_id.to_string())),
        }
    }

    async fn wait(&self, drm_id: &str, _timeout_secs: i64) -> Result<ExitInfo, DrmError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DrmCall::Wait { drm_id: drm_id.to_string() });
        match inner.jobs.get(drm_id) {
            Some(job) => Ok(job.exit.clone().unwrap_or_else(ExitInfo::undetermined)),
            None => Err(DrmError::UnknownId(drm_id.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
