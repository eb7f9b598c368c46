// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Job entity and submission spec.

use crate::status::{ExitInfo, FailureCause, JobStatus};
use crate::token::{CommandToken, TemporaryId, TransferId};
use crate::user::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::entity_id! {
    /// Unique identifier for a job.
    ///
    /// Assigned by the service at submission; the idempotency key for all
    /// engine bookkeeping (DRM submission is at-least-once keyed by this id,
    /// never by the DRM id).
    pub struct JobId("job-");
}

crate::entity_id! {
    /// Unique identifier for a workflow.
    pub struct WorkflowId("wfl-");
}

/// Hours before an entity is considered forgotten by its submitter.
pub const DEFAULT_DISPOSAL_HOURS: u32 = 168;

/// Parallel-job descriptor: configuration name (e.g. "MPI") and CPU ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelInfo {
    pub config_name: String,
    pub max_cpus: u32,
}

/// Client-side description of a job to submit.
///
/// The command is the only required piece. Everything the DRM needs beyond
/// it (stdio routing, working directory, native specification) rides along
/// as optional fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub command: Vec<CommandToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<CommandToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<CommandToken>,
    /// Mix the error stream into the output stream
    #[serde(default)]
    pub join_stderr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_target: Option<CommandToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_target: Option<CommandToken>,
    /// Higher runs first among simultaneously-ready jobs
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelInfo>,
    #[serde(default = "default_disposal_hours")]
    pub disposal_hours: u32,
    /// Transfers this job reads; holds a live reference until disposal
    #[serde(default)]
    pub referenced_inputs: Vec<TransferId>,
    /// Transfers this job writes; holds a live reference until disposal
    #[serde(default)]
    pub referenced_outputs: Vec<TransferId>,
    /// Barrier jobs have an empty command and never reach the DRM
    #[serde(default)]
    pub barrier: bool,
}

pub(crate) fn default_disposal_hours() -> u32 {
    DEFAULT_DISPOSAL_HOURS
}

impl JobSpec {
    pub fn new(command: Vec<CommandToken>) -> Self {
        Self { command, disposal_hours: DEFAULT_DISPOSAL_HOURS, ..Default::default() }
    }

    /// Convenience constructor from literal tokens.
    pub fn from_literals<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(command.into_iter().map(|s| CommandToken::Literal(s.into())).collect())
    }

    /// Dependency-hub job: empty command, computed status.
    pub fn barrier(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            barrier: true,
            disposal_hours: DEFAULT_DISPOSAL_HOURS,
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn working_directory(mut self, token: impl Into<CommandToken>) -> Self {
        self.working_directory = Some(token.into());
        self
    }

    pub fn stdin(mut self, token: impl Into<CommandToken>) -> Self {
        self.stdin = Some(token.into());
        self
    }

    pub fn join_stderr(mut self, join: bool) -> Self {
        self.join_stderr = join;
        self
    }

    pub fn stdout_target(mut self, token: impl Into<CommandToken>) -> Self {
        self.stdout_target = Some(token.into());
        self
    }

    pub fn stderr_target(mut self, token: impl Into<CommandToken>) -> Self {
        self.stderr_target = Some(token.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn native_spec(mut self, spec: impl Into<String>) -> Self {
        self.native_spec = Some(spec.into());
        self
    }

    pub fn parallel(mut self, info: ParallelInfo) -> Self {
        self.parallel = Some(info);
        self
    }

    pub fn disposal_hours(mut self, hours: u32) -> Self {
        self.disposal_hours = hours;
        self
    }

    pub fn referenced_inputs(mut self, transfers: Vec<TransferId>) -> Self {
        self.referenced_inputs = transfers;
        self
    }

    pub fn referenced_outputs(mut self, transfers: Vec<TransferId>) -> Self {
        self.referenced_outputs = transfers;
        self
    }

    /// All tokens the resolver will touch, in resolution order.
    fn all_tokens(&self) -> impl Iterator<Item = &CommandToken> {
        self.command
            .iter()
            .chain(self.working_directory.iter())
            .chain(self.stdin.iter())
            .chain(self.stdout_target.iter())
            .chain(self.stderr_target.iter())
    }

    /// Every transfer referenced anywhere in the spec's tokens.
    pub fn transfers_in_tokens(&self) -> Vec<TransferId> {
        let mut out = Vec::new();
        for t in self.all_tokens() {
            t.collect_transfers(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }

    /// Every temporary referenced anywhere in the spec's tokens.
    pub fn temporaries_in_tokens(&self) -> Vec<TemporaryId> {
        let mut out = Vec::new();
        for t in self.all_tokens() {
            t.collect_temporaries(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }

    /// Validate submission invariants.
    ///
    /// A non-barrier command must be non-empty, and the referenced
    /// input/output sets must include every transfer appearing in the
    /// spec's tokens.
    pub fn validate(&self) -> Result<(), JobSpecError> {
        if self.barrier {
            if !self.command.is_empty() {
                return Err(JobSpecError::BarrierWithCommand);
            }
            return Ok(());
        }
        if self.command.is_empty() {
            return Err(JobSpecError::EmptyCommand);
        }
        for id in self.transfers_in_tokens() {
            if !self.referenced_inputs.contains(&id) && !self.referenced_outputs.contains(&id) {
                return Err(JobSpecError::UnreferencedTransfer(id));
            }
        }
        Ok(())
    }
}

/// Validation failures for a [`JobSpec`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JobSpecError {
    #[error("the command must contain at least one element")]
    EmptyCommand,

    #[error("barrier jobs cannot carry a command")]
    BarrierWithCommand,

    #[error("transfer {0} appears in the command but not in the referenced input/output sets")]
    UnreferencedTransfer(TransferId),
}

/// A job as persisted by the state store.
///
/// Command and referenced paths are immutable after submission; only the
/// lifecycle fields (`status`, `drm_id`, `exit`, stdio paths) change, and
/// only through store events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    pub name: String,
    #[serde(default)]
    pub barrier: bool,
    pub command: Vec<CommandToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<CommandToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<CommandToken>,
    #[serde(default)]
    pub join_stderr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_target: Option<CommandToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_target: Option<CommandToken>,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelInfo>,
    #[serde(default)]
    pub referenced_inputs: Vec<TransferId>,
    #[serde(default)]
    pub referenced_outputs: Vec<TransferId>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<FailureCause>,
    /// Opaque identifier returned by the DRM at submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitInfo>,
    /// Service-owned stdout file, allocated at submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_path: Option<PathBuf>,
    /// Service-owned stderr file; absent when stderr is joined into stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_path: Option<PathBuf>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at_ms: Option<u64>,
    /// Past this instant the sweeper disposes the job
    pub expires_at: DateTime<Utc>,
}

impl Job {
    /// Materialize a validated spec into a stored job.
    pub fn from_spec(
        id: JobId,
        user_id: UserId,
        workflow_id: Option<WorkflowId>,
        spec: JobSpec,
        created_at_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = now + Duration::hours(i64::from(spec.disposal_hours));
        Self {
            id,
            user_id,
            workflow_id,
            name: spec.name.unwrap_or_else(|| id.to_string()),
            barrier: spec.barrier,
            command: spec.command,
            working_directory: spec.working_directory,
            stdin: spec.stdin,
            join_stderr: spec.join_stderr,
            stdout_target: spec.stdout_target,
            stderr_target: spec.stderr_target,
            priority: spec.priority,
            native_spec: spec.native_spec,
            parallel: spec.parallel,
            referenced_inputs: spec.referenced_inputs,
            referenced_outputs: spec.referenced_outputs,
            status: JobStatus::NotSubmitted,
            failure_cause: None,
            drm_id: None,
            exit: None,
            stdout_path: None,
            stderr_path: None,
            created_at_ms,
            submitted_at_ms: None,
            expires_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transfers referenced by this job (inputs ∪ outputs), deduplicated.
    pub fn referenced_transfers(&self) -> Vec<TransferId> {
        let mut out = self.referenced_inputs.clone();
        out.extend(self.referenced_outputs.iter().cloned());
        out.sort();
        out.dedup();
        out
    }

    /// Temporaries referenced anywhere in the job's tokens.
    pub fn referenced_temporaries(&self) -> Vec<TemporaryId> {
        let mut out = Vec::new();
        let tokens = self
            .command
            .iter()
            .chain(self.working_directory.iter())
            .chain(self.stdin.iter())
            .chain(self.stdout_target.iter())
            .chain(self.stderr_target.iter());
        for t in tokens {
            t.collect_temporaries(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }
}

/// Test builder producing a minimal live job (a fresh id, a no-op
/// command, `Pending`) that individual tests override as needed.
#[cfg(any(test, feature = "test-support"))]
pub struct JobBuilder {
    name: String,
    user_id: UserId,
    workflow_id: Option<WorkflowId>,
    barrier: bool,
    command: Vec<CommandToken>,
    working_directory: Option<CommandToken>,
    stdin: Option<CommandToken>,
    stdout_target: Option<CommandToken>,
    priority: i32,
    referenced_inputs: Vec<TransferId>,
    referenced_outputs: Vec<TransferId>,
    status: JobStatus,
    drm_id: Option<String>,
    created_at_ms: u64,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            name: "test-job".into(),
            user_id: UserId::from_string("usr-test"),
            workflow_id: None,
            barrier: false,
            command: vec![CommandToken::literal("true")],
            working_directory: None,
            stdin: None,
            stdout_target: None,
            priority: 0,
            referenced_inputs: Vec::new(),
            referenced_outputs: Vec::new(),
            status: JobStatus::Pending,
            drm_id: None,
            created_at_ms: 1_000_000,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    pub fn user_id(mut self, v: UserId) -> Self {
        self.user_id = v;
        self
    }

    pub fn workflow_id(mut self, v: WorkflowId) -> Self {
        self.workflow_id = Some(v);
        self
    }

    pub fn barrier(mut self, v: bool) -> Self {
        self.barrier = v;
        self
    }

    pub fn command(mut self, v: Vec<CommandToken>) -> Self {
        self.command = v;
        self
    }

    pub fn working_directory(mut self, v: CommandToken) -> Self {
        self.working_directory = Some(v);
        self
    }

    pub fn stdin(mut self, v: CommandToken) -> Self {
        self.stdin = Some(v);
        self
    }

    pub fn stdout_target(mut self, v: CommandToken) -> Self {
        self.stdout_target = Some(v);
        self
    }

    pub fn priority(mut self, v: i32) -> Self {
        self.priority = v;
        self
    }

    pub fn referenced_inputs(mut self, v: Vec<TransferId>) -> Self {
        self.referenced_inputs = v;
        self
    }

    pub fn referenced_outputs(mut self, v: Vec<TransferId>) -> Self {
        self.referenced_outputs = v;
        self
    }

    pub fn status(mut self, v: JobStatus) -> Self {
        self.status = v;
        self
    }

    pub fn drm_id(mut self, v: impl Into<String>) -> Self {
        self.drm_id = Some(v.into());
        self
    }

    pub fn created_at_ms(mut self, v: u64) -> Self {
        self.created_at_ms = v;
        self
    }

    pub fn build(self) -> Job {
        Job {
            id: JobId::new(),
            user_id: self.user_id,
            workflow_id: self.workflow_id,
            name: self.name,
            barrier: self.barrier,
            command: self.command,
            working_directory: self.working_directory,
            stdin: self.stdin,
            join_stderr: false,
            stdout_target: self.stdout_target,
            stderr_target: None,
            priority: self.priority,
            native_spec: None,
            parallel: None,
            referenced_inputs: self.referenced_inputs,
            referenced_outputs: self.referenced_outputs,
            status: self.status,
            failure_cause: None,
            drm_id: self.drm_id,
            exit: None,
            stdout_path: None,
            stderr_path: None,
            created_at_ms: self.created_at_ms,
            submitted_at_ms: None,
            expires_at: Utc::now() + Duration::hours(i64::from(DEFAULT_DISPOSAL_HOURS)),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Job {
    /// Create a builder with test defaults.
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
