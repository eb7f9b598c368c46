// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Ownership-gated store facade.
//!
//! The store is the single authority for entity state. Mutations are
//! serialized through one mutex: append the event to the WAL, flush, apply
//! to the materialized state. Concurrent readers therefore never observe a
//! partial graph mutation, and a crash between flush and apply is healed
//! by replay.
//!
//! Client-facing methods take the acting [`UserId`] and reject owner
//! mismatches before any work. Engine-facing mutators (status transitions,
//! DRM bookkeeping) are system-level and ungated — the engine validates
//! ownership at its own entry points.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Duration, Utc};
use gm_core::{
    graph, ErrorKind, Event, ExitInfo, FailureCause, GroupId, GroupRecord, Job, JobId, JobSpec,
    JobStatus, Temporary, TemporaryId, Transfer, TransferId, TransferStatus, UserId, Workflow,
    WorkflowElement, WorkflowId, WorkflowSpec, WorkflowStatus,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Events between automatic checkpoints.
const CHECKPOINT_EVERY: usize = 256;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity is owned by a different user")]
    Unauthorized,

    #[error("entity not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("workflow dependency graph has a cycle")]
    Cyclic,

    #[error("transfer conflict: {0}")]
    TransferConflict(String),

    #[error(transparent)]
    Wal(#[from] WalError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl StoreError {
    /// Wire-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unauthorized => ErrorKind::Unauthorized,
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::Cyclic => ErrorKind::WorkflowCyclic,
            StoreError::TransferConflict(_) => ErrorKind::TransferConflict,
            StoreError::Wal(_) | StoreError::Snapshot(_) => ErrorKind::Internal,
        }
    }
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
    snapshot_path: PathBuf,
    events_since_checkpoint: usize,
}

/// Persistent, transactional record of users, jobs, workflows, and transfers.
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    /// Open the store under `data_dir`, replaying any WAL tail past the
    /// newest snapshot.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir).map_err(WalError::Io)?;
        let snapshot_path = data_dir.join("state.snapshot");
        let wal_path = data_dir.join("events.wal");

        let (mut state, processed_seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.processed_seq),
            None => (MaterializedState::default(), 0),
        };

        let mut wal = Wal::open(&wal_path, processed_seq)?;
        let mut replayed = 0usize;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
            replayed += 1;
        }
        if replayed > 0 {
            debug!(replayed, "replayed WAL tail");
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                wal,
                snapshot_path,
                events_since_checkpoint: 0,
            }),
        })
    }

    /// Run a read against the materialized state.
    ///
    /// The closure must not call back into the store.
    pub fn with_state<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    // ---------- users ----------

    /// Bind a login to a user id; idempotent per login.
    pub fn register_user(&self, login: &str, now_ms: u64) -> Result<UserId, StoreError> {
        if login.is_empty() {
            return Err(StoreError::InvalidArgument("login must not be empty".into()));
        }
        let mut inner = self.inner.lock();
        if let Some(id) = inner.state.logins.get(login) {
            return Ok(*id);
        }
        let id = UserId::new();
        commit(
            &mut inner,
            Event::UserRegistered { id, login: login.to_string(), registered_at_ms: now_ms },
        )?;
        Ok(id)
    }

    // ---------- jobs ----------

    /// Persist a standalone job; it becomes schedulable immediately.
    pub fn submit_job(
        &self,
        user: UserId,
        spec: JobSpec,
        now: DateTime<Utc>,
        now_ms: u64,
    ) -> Result<JobId, StoreError> {
        if spec.barrier {
            return Err(StoreError::InvalidArgument(
                "barrier jobs exist only inside workflows".into(),
            ));
        }
        spec.validate().map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

        let mut inner = self.inner.lock();
        check_spec_references(&inner.state, user, &spec, &[])?;

        let id = JobId::new();
        let mut job = Job::from_spec(id, user, None, spec, now_ms, now);
        job.status = JobStatus::Pending;
        commit(&mut inner, Event::JobCreated { job: Box::new(job) })?;
        Ok(id)
    }

    /// Normalize a workflow spec (group expansion + acyclicity), persist the
    /// workflow with all member jobs and temporaries in one WAL entry, and
    /// return its id.
    pub fn submit_workflow(
        &self,
        user: UserId,
        spec: WorkflowSpec,
        now: DateTime<Utc>,
        now_ms: u64,
    ) -> Result<WorkflowId, StoreError> {
        let expanded = graph::normalize(&spec).map_err(|e| match e {
            graph::GraphError::Cyclic => StoreError::Cyclic,
            graph::GraphError::Spec(err) => StoreError::InvalidArgument(err.to_string()),
        })?;
        for job_spec in &expanded.jobs {
            job_spec.validate().map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
        }

        let mut inner = self.inner.lock();
        for job_spec in &expanded.jobs {
            check_spec_references(&inner.state, user, job_spec, &spec.temporaries)?;
        }

        let workflow_id = WorkflowId::new();
        let expires_at = now + Duration::hours(i64::from(spec.disposal_hours));

        let job_ids: Vec<JobId> = expanded.jobs.iter().map(|_| JobId::new()).collect();
        let jobs: Vec<Job> = expanded
            .jobs
            .iter()
            .zip(&job_ids)
            .map(|(job_spec, id)| {
                let mut job = Job::from_spec(
                    *id,
                    user,
                    Some(workflow_id),
                    job_spec.clone(),
                    now_ms,
                    now,
                );
                job.status = JobStatus::Pending;
                // Workflow members share the workflow's disposal horizon
                job.expires_at = expires_at;
                job
            })
            .collect();

        let dependencies: Vec<(JobId, JobId)> = expanded
            .dependencies
            .iter()
            .map(|&(p, s)| (job_ids[p], job_ids[s]))
            .collect();

        let temporaries: Vec<Temporary> = spec
            .temporaries
            .iter()
            .map(|decl| Temporary {
                id: decl.id,
                user_id: user,
                is_directory: decl.is_directory,
                suffix: decl.suffix.clone(),
                concrete_path: None,
                disposal_hours: decl.disposal_hours,
                refs: Default::default(),
            })
            .collect();

        let groups = build_group_records(&spec, &job_ids);
        let workflow = Workflow {
            id: workflow_id,
            user_id: user,
            name: spec.name.clone().unwrap_or_else(|| workflow_id.to_string()),
            status: WorkflowStatus::Submitted,
            job_ids,
            dependencies,
            groups,
            created_at_ms: now_ms,
            expires_at,
        };
        commit(
            &mut inner,
            Event::WorkflowCreated { workflow: Box::new(workflow), jobs, temporaries },
        )?;
        Ok(workflow_id)
    }

    /// Fetch a job, gated by ownership.
    pub fn job(&self, user: UserId, id: JobId) -> Result<Job, StoreError> {
        self.with_state(|state| owned_job(state, user, id).cloned())
    }

    /// Jobs owned by `user`, ordered by creation time then id.
    pub fn list_jobs(&self, user: UserId) -> Vec<Job> {
        self.with_state(|state| {
            let mut jobs: Vec<Job> = state.user_jobs(user).into_iter().cloned().collect();
            jobs.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then(a.id.cmp(&b.id)));
            jobs
        })
    }

    /// Fetch a workflow, gated by ownership.
    pub fn workflow(&self, user: UserId, id: WorkflowId) -> Result<Workflow, StoreError> {
        self.with_state(|state| owned_workflow(state, user, id).cloned())
    }

    /// Workflows owned by `user`, ordered by creation time then id.
    pub fn list_workflows(&self, user: UserId) -> Vec<Workflow> {
        self.with_state(|state| {
            let mut wfs: Vec<Workflow> = state.user_workflows(user).into_iter().cloned().collect();
            wfs.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then(a.id.cmp(&b.id)));
            wfs
        })
    }

    // ---------- engine-facing job mutators ----------

    pub fn record_stdio(
        &self,
        id: JobId,
        stdout: PathBuf,
        stderr: Option<PathBuf>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_job(&inner.state, id)?;
        commit(&mut inner, Event::JobStdioAllocated { id, stdout, stderr })
    }

    pub fn record_submission(
        &self,
        id: JobId,
        drm_id: &str,
        submitted_at_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_job(&inner.state, id)?;
        commit(
            &mut inner,
            Event::JobSubmitted { id, drm_id: drm_id.to_string(), submitted_at_ms },
        )
    }

    pub fn set_job_status(&self, id: JobId, status: JobStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = require_job(&inner.state, id)?.status;
        // Terminal states are sticky; only disposal removes them
        if current == status || current.is_terminal() {
            return Ok(());
        }
        commit(&mut inner, Event::JobStatusChanged { id, status })
    }

    pub fn fail_job(&self, id: JobId, cause: FailureCause) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let job = require_job(&inner.state, id)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        commit(&mut inner, Event::JobFailed { id, cause })
    }

    pub fn record_exit(&self, id: JobId, exit: ExitInfo) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_job(&inner.state, id)?;
        commit(&mut inner, Event::JobExitRecorded { id, exit })
    }

    /// Remove a job and release its transfer/temporary references.
    pub fn dispose_job(&self, id: JobId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.jobs.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        commit(&mut inner, Event::JobDisposed { id })
    }

    pub fn set_workflow_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = match inner.state.workflows.get(&id) {
            Some(wf) => wf.status,
            None => return Err(StoreError::NotFound),
        };
        if current == status {
            return Ok(());
        }
        commit(&mut inner, Event::WorkflowStatusChanged { id, status })
    }

    /// Remove a workflow record. Member jobs must be disposed first (their
    /// own events), so a crash mid-dispose is re-driven from DeletePending.
    pub fn dispose_workflow(&self, id: WorkflowId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.workflows.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        commit(&mut inner, Event::WorkflowDisposed { id })
    }

    // ---------- transfers ----------

    /// Record a freshly-allocated transfer. The server path must be unique.
    pub fn register_transfer(&self, transfer: Transfer) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.transfers.contains_key(&transfer.id) {
            return Err(StoreError::TransferConflict(format!(
                "server path {} already registered",
                transfer.id
            )));
        }
        commit(&mut inner, Event::TransferRegistered { transfer: Box::new(transfer) })
    }

    /// Fetch a transfer, gated by ownership.
    pub fn transfer(&self, user: UserId, id: &TransferId) -> Result<Transfer, StoreError> {
        self.with_state(|state| owned_transfer(state, user, id).cloned())
    }

    /// Transfers owned by `user`, ordered by registration time then path.
    pub fn list_transfers(&self, user: UserId) -> Vec<Transfer> {
        self.with_state(|state| {
            let mut ts: Vec<Transfer> = state.user_transfers(user).into_iter().cloned().collect();
            ts.sort_by(|a, b| {
                a.registered_at_ms.cmp(&b.registered_at_ms).then_with(|| a.id.cmp(&b.id))
            });
            ts
        })
    }

    pub fn set_transfer_status(
        &self,
        id: &TransferId,
        status: TransferStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = match inner.state.transfers.get(id) {
            Some(t) => t.status,
            None => return Err(StoreError::NotFound),
        };
        if current == status {
            return Ok(());
        }
        commit(&mut inner, Event::TransferStatusChanged { id: id.clone(), status })
    }

    /// Move a transfer's expiration (cancel sets it to "now").
    pub fn set_transfer_expiration(
        &self,
        id: &TransferId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.transfers.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        commit(&mut inner, Event::TransferExpirationSet { id: id.clone(), expires_at })
    }

    /// Drop a transfer record after its bytes were deleted.
    pub fn sweep_transfer(&self, id: &TransferId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.transfers.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        commit(&mut inner, Event::TransferSwept { id: id.clone() })
    }

    // ---------- temporaries ----------

    /// Record the concrete scratch path chosen at first use.
    pub fn allocate_temporary(
        &self,
        id: TemporaryId,
        concrete_path: PathBuf,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match inner.state.temporaries.get(&id) {
            None => return Err(StoreError::NotFound),
            Some(t) if t.concrete_path.is_some() => return Ok(()),
            Some(_) => {}
        }
        commit(&mut inner, Event::TemporaryAllocated { id, concrete_path })
    }

    /// Drop a temporary record after its path was deleted.
    pub fn remove_temporary(&self, id: TemporaryId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.temporaries.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        commit(&mut inner, Event::TemporaryRemoved { id })
    }

    // ---------- sweeper queries ----------

    /// Jobs whose disposal deadline has passed.
    pub fn expired_jobs(&self, now: DateTime<Utc>) -> Vec<JobId> {
        self.with_state(|state| {
            let mut ids: Vec<JobId> =
                state.jobs.values().filter(|j| j.expires_at <= now).map(|j| j.id).collect();
            ids.sort();
            ids
        })
    }

    /// Workflows whose disposal deadline has passed, or that were left in
    /// DeletePending by an interrupted dispose.
    pub fn expired_workflows(&self, now: DateTime<Utc>) -> Vec<WorkflowId> {
        self.with_state(|state| {
            let mut ids: Vec<WorkflowId> = state
                .workflows
                .values()
                .filter(|w| w.expires_at <= now || w.status == WorkflowStatus::DeletePending)
                .map(|w| w.id)
                .collect();
            ids.sort();
            ids
        })
    }

    /// Transfers whose bytes may be deleted: expired AND unreferenced.
    pub fn sweepable_transfers(&self, now: DateTime<Utc>) -> Vec<Transfer> {
        self.with_state(|state| {
            let mut ts: Vec<Transfer> = state
                .transfers
                .values()
                .filter(|t| t.expires_at <= now && !t.is_referenced())
                .cloned()
                .collect();
            ts.sort_by(|a, b| a.id.cmp(&b.id));
            ts
        })
    }

    /// Temporaries with no live job references.
    pub fn unreferenced_temporaries(&self) -> Vec<Temporary> {
        self.with_state(|state| {
            let mut ts: Vec<Temporary> =
                state.temporaries.values().filter(|t| t.refs.is_empty()).cloned().collect();
            ts.sort_by_key(|t| t.id);
            ts
        })
    }

    /// Checkpoint now (used at clean shutdown).
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        write_checkpoint(&mut inner)
    }
}

/// Append, flush, apply — the unit of durability.
fn commit(inner: &mut Inner, event: Event) -> Result<(), StoreError> {
    let seq = inner.wal.append(&event)?;
    inner.wal.flush()?;
    inner.state.apply_event(&event);
    inner.wal.mark_processed(seq);
    inner.events_since_checkpoint += 1;
    if inner.events_since_checkpoint >= CHECKPOINT_EVERY {
        // Best-effort: a failed checkpoint leaves a longer replay, not data loss
        if let Err(e) = write_checkpoint(inner) {
            warn!("checkpoint failed: {e}");
        }
    }
    Ok(())
}

fn write_checkpoint(inner: &mut Inner) -> Result<(), StoreError> {
    let snapshot = Snapshot::new(inner.wal.processed_seq(), inner.state.clone());
    snapshot.save(&inner.snapshot_path)?;
    inner.wal.compact()?;
    inner.events_since_checkpoint = 0;
    Ok(())
}

fn owned_job(
    state: &MaterializedState,
    user: UserId,
    id: JobId,
) -> Result<&Job, StoreError> {
    match state.jobs.get(&id) {
        None => Err(StoreError::NotFound),
        Some(job) if job.user_id != user => Err(StoreError::Unauthorized),
        Some(job) => Ok(job),
    }
}

fn owned_workflow(
    state: &MaterializedState,
    user: UserId,
    id: WorkflowId,
) -> Result<&Workflow, StoreError> {
    match state.workflows.get(&id) {
        None => Err(StoreError::NotFound),
        Some(wf) if wf.user_id != user => Err(StoreError::Unauthorized),
        Some(wf) => Ok(wf),
    }
}

fn owned_transfer<'a>(
    state: &'a MaterializedState,
    user: UserId,
    id: &TransferId,
) -> Result<&'a Transfer, StoreError> {
    match state.transfers.get(id) {
        None => Err(StoreError::NotFound),
        Some(t) if t.user_id != user => Err(StoreError::Unauthorized),
        Some(t) => Ok(t),
    }
}

fn require_job(state: &MaterializedState, id: JobId) -> Result<&Job, StoreError> {
    state.jobs.get(&id).ok_or(StoreError::NotFound)
}

/// Referenced transfers must exist and be owned; referenced temporaries
/// must be declared by this workflow or already registered to the user.
fn check_spec_references(
    state: &MaterializedState,
    user: UserId,
    spec: &JobSpec,
    declared: &[gm_core::TemporaryDecl],
) -> Result<(), StoreError> {
    for tid in spec.referenced_inputs.iter().chain(&spec.referenced_outputs) {
        owned_transfer(state, user, tid).map_err(|e| match e {
            StoreError::NotFound => {
                StoreError::InvalidArgument(format!("unknown transfer {tid}"))
            }
            other => other,
        })?;
    }
    for tmp in spec.temporaries_in_tokens() {
        let is_declared = declared.iter().any(|d| d.id == tmp);
        let is_known =
            state.temporaries.get(&tmp).map(|t| t.user_id == user).unwrap_or(false);
        if !is_declared && !is_known {
            return Err(StoreError::InvalidArgument(format!("unknown temporary path {tmp}")));
        }
    }
    Ok(())
}

/// Display-only group records with stable ids, resolved to job ids.
fn build_group_records(spec: &WorkflowSpec, job_ids: &[JobId]) -> Vec<GroupRecord> {
    let group_ids: Vec<GroupId> = spec.groups.iter().map(|_| GroupId::new()).collect();
    let mut records: Vec<GroupRecord> = spec
        .groups
        .iter()
        .zip(&group_ids)
        .map(|(g, id)| GroupRecord {
            id: *id,
            name: g.name.clone(),
            parent: None,
            jobs: Vec::new(),
            subgroups: Vec::new(),
        })
        .collect();

    for (gi, group) in spec.groups.iter().enumerate() {
        for el in &group.elements {
            match *el {
                WorkflowElement::Job(j) => {
                    records[gi].jobs.push(job_ids[j]);
                }
                WorkflowElement::Group(sub) => {
                    let sub_id = group_ids[sub];
                    records[gi].subgroups.push(sub_id);
                    records[sub].parent = Some(group_ids[gi]);
                }
            }
        }
    }
    records
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
