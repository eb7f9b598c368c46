// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Workflow entity, submission spec, and display-only grouping.

use crate::job::{JobId, JobSpec, WorkflowId, DEFAULT_DISPOSAL_HOURS};
use crate::status::WorkflowStatus;
use crate::transfer::TemporaryDecl;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::entity_id! {
    /// Unique identifier for a display group.
    pub struct GroupId("grp-");
}

/// One endpoint of a spec-level dependency or group membership: an index
/// into `WorkflowSpec::jobs` or `WorkflowSpec::groups`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowElement {
    Job(usize),
    Group(usize),
}

/// Named set of jobs and/or subgroups; purely structural, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub elements: Vec<WorkflowElement>,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>, elements: Vec<WorkflowElement>) -> Self {
        Self { name: name.into(), elements }
    }
}

/// Client-side description of a workflow to submit.
///
/// Dependencies may name groups; group endpoints are rewritten into barrier
/// hubs before the workflow reaches the engine (see [`crate::graph`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub dependencies: Vec<(WorkflowElement, WorkflowElement)>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub temporaries: Vec<TemporaryDecl>,
    #[serde(default = "crate::job::default_disposal_hours")]
    pub disposal_hours: u32,
}

impl WorkflowSpec {
    pub fn new(jobs: Vec<JobSpec>) -> Self {
        Self { jobs, disposal_hours: DEFAULT_DISPOSAL_HOURS, ..Default::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn dependencies(mut self, deps: Vec<(WorkflowElement, WorkflowElement)>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn groups(mut self, groups: Vec<GroupSpec>) -> Self {
        self.groups = groups;
        self
    }

    pub fn temporaries(mut self, decls: Vec<TemporaryDecl>) -> Self {
        self.temporaries = decls;
        self
    }

    pub fn disposal_hours(mut self, hours: u32) -> Self {
        self.disposal_hours = hours;
        self
    }

    /// Check that every dependency and group-membership endpoint names an
    /// existing element.
    pub fn validate_endpoints(&self) -> Result<(), WorkflowSpecError> {
        let check = |el: &WorkflowElement| match *el {
            WorkflowElement::Job(i) if i >= self.jobs.len() => {
                Err(WorkflowSpecError::UnknownJob(i))
            }
            WorkflowElement::Group(i) if i >= self.groups.len() => {
                Err(WorkflowSpecError::UnknownGroup(i))
            }
            _ => Ok(()),
        };
        for (from, to) in &self.dependencies {
            check(from)?;
            check(to)?;
        }
        for group in &self.groups {
            for el in &group.elements {
                check(el)?;
            }
        }
        Ok(())
    }
}

/// Validation failures for a [`WorkflowSpec`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowSpecError {
    #[error("dependency names job index {0}, which does not exist")]
    UnknownJob(usize),

    #[error("dependency names group index {0}, which does not exist")]
    UnknownGroup(usize),
}

/// Display-only group record, resolved to stored ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<GroupId>,
    #[serde(default)]
    pub jobs: Vec<JobId>,
    #[serde(default)]
    pub subgroups: Vec<GroupId>,
}

/// A workflow as persisted by the state store.
///
/// Jobs and dependencies are stored post-expansion: every endpoint is a
/// job id, and barrier hubs are ordinary (empty-command) members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub user_id: UserId,
    pub name: String,
    pub status: WorkflowStatus,
    pub job_ids: Vec<JobId>,
    /// (predecessor, successor) pairs over `job_ids`
    pub dependencies: Vec<(JobId, JobId)>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    pub created_at_ms: u64,
    pub expires_at: DateTime<Utc>,
}

impl Workflow {
    /// Predecessors of `job` within this workflow.
    pub fn predecessors_of(&self, job: JobId) -> impl Iterator<Item = JobId> + '_ {
        self.dependencies.iter().filter(move |(_, s)| *s == job).map(|(p, _)| *p)
    }

    /// Successors of `job` within this workflow.
    pub fn successors_of(&self, job: JobId) -> impl Iterator<Item = JobId> + '_ {
        self.dependencies.iter().filter(move |(p, _)| *p == job).map(|(_, s)| *s)
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
