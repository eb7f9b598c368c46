// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Abstract contract over the site DRM (Condor, SGE, LSF, PBS, …).
//!
//! The engine sees only this trait: submit a fully-resolved template and
//! get an opaque DRM id back, then poll, control, and wait by that id.
//! All operations are idempotent with respect to the DRM id. Transient
//! failures are surfaced as [`DrmError::Unavailable`] and retried by the
//! engine with bounded exponential backoff.

use async_trait::async_trait;
use gm_core::{ExitInfo, JobStatus, ParallelInfo};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Everything the DRM needs to run one job. All paths are concrete
/// compute-side paths — symbolic references were resolved before this
/// template was built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrmTemplate {
    pub command: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_path: Option<PathBuf>,
    /// Absent when stderr is joined into stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_path: Option<PathBuf>,
    #[serde(default)]
    pub join_stderr: bool,
    #[serde(default)]
    pub environment: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelInfo>,
}

/// Job status as reported by the DRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrmStatus {
    Undetermined,
    QueuedActive,
    SystemOnHold,
    UserOnHold,
    UserSystemOnHold,
    Running,
    SystemSuspended,
    UserSuspended,
    UserSystemSuspended,
    Done,
    Failed,
}

impl DrmStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DrmStatus::Done | DrmStatus::Failed)
    }
}

impl From<DrmStatus> for JobStatus {
    fn from(status: DrmStatus) -> Self {
        match status {
            DrmStatus::Undetermined => JobStatus::Undetermined,
            DrmStatus::QueuedActive => JobStatus::QueuedActive,
            DrmStatus::SystemOnHold => JobStatus::SystemOnHold,
            DrmStatus::UserOnHold => JobStatus::UserOnHold,
            DrmStatus::UserSystemOnHold => JobStatus::UserSystemOnHold,
            DrmStatus::Running => JobStatus::Running,
            DrmStatus::SystemSuspended => JobStatus::SystemSuspended,
            DrmStatus::UserSuspended => JobStatus::UserSuspended,
            DrmStatus::UserSystemSuspended => JobStatus::UserSystemSuspended,
            DrmStatus::Done => JobStatus::Done,
            DrmStatus::Failed => JobStatus::Failed,
        }
    }
}

/// Errors from DRM adapter operations.
#[derive(Debug, Error)]
pub enum DrmError {
    /// The DRM rejected the template outright (permanent)
    #[error("DRM rejected the submission: {0}")]
    Rejected(String),

    /// The DRM id is unknown to the adapter (permanent)
    #[error("unknown DRM id: {0}")]
    UnknownId(String),

    /// The DRM could not be reached or answered abnormally (transient)
    #[error("DRM unavailable: {0}")]
    Unavailable(String),

    /// A bounded `wait` elapsed before the job terminated
    #[error("wait timed out")]
    WaitTimeout,
}

impl DrmError {
    /// Transient errors are retried with backoff; permanent ones are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, DrmError::Unavailable(_))
    }
}

/// Thin wrapper over a site DRM.
#[async_trait]
pub trait DrmAdapter: Send + Sync {
    /// Submit a resolved template; returns the DRM's opaque job id.
    async fn submit(&self, template: DrmTemplate) -> Result<String, DrmError>;

    /// Current status of a submitted job.
    async fn status(&self, drm_id: &str) -> Result<DrmStatus, DrmError>;

    /// Hold a queued job (or suspend a running one, where supported).
    async fn hold(&self, drm_id: &str) -> Result<(), DrmError>;

    /// Release a held or suspended job.
    async fn release(&self, drm_id: &str) -> Result<(), DrmError>;

    /// Terminate a job. Idempotent: killing a terminal job succeeds.
    async fn kill(&self, drm_id: &str) -> Result<(), DrmError>;

    /// Block until the job terminates and return its exit information.
    ///
    /// `timeout_secs < 0` blocks indefinitely; `0` polls and returns
    /// [`DrmError::WaitTimeout`] if the job is still live.
    async fn wait(&self, drm_id: &str, timeout_secs: i64) -> Result<ExitInfo, DrmError>;
}

#[cfg(test)]
#[path = "drm_tests.rs"]
mod tests;
