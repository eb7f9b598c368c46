// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! The workflow engine: owns the ready-queue, drives state transitions,
//! submits to the DRM adapter, and consumes DRM status updates.
//!
//! Every tick: settle barriers and upstream failures, dispatch ready jobs
//! (resolve → submit → record DRM id), poll a bounded batch of in-flight
//! DRM ids, settle again, and refresh workflow statuses. No store lock is
//! held across a DRM call: reads snapshot under the lock, adapter calls
//! happen outside it, results are recorded in a second transaction.

use crate::error::EngineError;
use crate::resolver::{self, ResolveError, TranslationTable};
use crate::scheduler;
use chrono::{DateTime, Utc};
use gm_adapters::{Backoff, DrmAdapter, DrmError};
use gm_core::{
    Clock, ExitInfo, FailureCause, Job, JobId, JobStatus, TransferId, TransferStatus, UserId,
    WorkflowId, WorkflowStatus,
};
use gm_storage::{Store, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on simultaneously in-DRM jobs per user
    pub max_in_drm_per_user: usize,
    /// In-flight DRM ids polled per tick
    pub poll_batch: usize,
    /// Bounded submit retries for transient DRM faults
    pub submit_attempts: u32,
    /// Base delay for exponential backoff
    pub retry_base: Duration,
    /// Consecutive transient status failures before a job is failed
    pub status_failure_limit: u32,
    /// Directory for service-owned stdout/stderr files
    pub stdio_dir: PathBuf,
    /// Directory for lazily-allocated temporary paths
    pub scratch_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(state_dir: &std::path::Path) -> Self {
        Self {
            max_in_drm_per_user: 200,
            poll_batch: 64,
            submit_attempts: 4,
            retry_base: Duration::from_millis(250),
            status_failure_limit: 5,
            stdio_dir: state_dir.join("stdio"),
            scratch_dir: state_dir.join("scratch"),
        }
    }
}

/// Dependency-driven scheduler over the store and a DRM adapter.
pub struct Engine<C: Clock> {
    store: Arc<Store>,
    drm: Arc<dyn DrmAdapter>,
    table: TranslationTable,
    config: EngineConfig,
    clock: C,
    poll_cursor: Mutex<usize>,
    status_failures: Mutex<HashMap<JobId, u32>>,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        store: Arc<Store>,
        drm: Arc<dyn DrmAdapter>,
        table: TranslationTable,
        config: EngineConfig,
        clock: C,
    ) -> Self {
        Self {
            store,
            drm,
            table,
            config,
            clock,
            poll_cursor: Mutex::new(0),
            status_failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// One scheduler iteration.
    pub async fn tick(&self) -> Result<(), EngineError> {
        self.settle()?;
        self.dispatch().await?;
        self.poll().await?;
        self.settle()?;
        self.refresh_workflows()?;
        Ok(())
    }

    /// Drive the engine until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("engine tick failed: {e}");
                    }
                }
            }
        }
        debug!("engine loop stopped");
    }

    /// Settle computed transitions to a fixpoint: barriers whose
    /// predecessors are all DONE become DONE, and jobs with a
    /// terminal-non-DONE predecessor fail with `upstream_failed` without
    /// ever reaching the DRM.
    fn settle(&self) -> Result<(), EngineError> {
        loop {
            let step = self.store.with_state(scheduler::propagate);
            if step.barriers_done.is_empty() && step.upstream_failed.is_empty() {
                return Ok(());
            }
            for id in step.barriers_done {
                self.store.set_job_status(id, JobStatus::Done)?;
            }
            for id in step.upstream_failed {
                debug!(job = %id, "predecessor failed; propagating");
                self.store.fail_job(id, FailureCause::UpstreamFailed)?;
            }
        }
    }

    /// Submit every ready job that fits under the per-user cap.
    async fn dispatch(&self) -> Result<(), EngineError> {
        let candidates = self
            .store
            .with_state(|s| scheduler::select_for_dispatch(s, self.config.max_in_drm_per_user));
        for job in candidates {
            self.dispatch_one(&job).await?;
        }
        Ok(())
    }

    async fn dispatch_one(&self, job: &Job) -> Result<(), EngineError> {
        let resolved = self.store.with_state(|s| {
            resolver::resolve_job(job, s, &self.table, &self.config.scratch_dir)
        });
        let mut resolved = match resolved {
            Ok(r) => r,
            Err(e @ ResolveError::MissingTranslation { .. }) => {
                error!(job = %job.id, "configuration error: {e}");
                self.store.fail_job(job.id, FailureCause::SubmissionError)?;
                return Ok(());
            }
            Err(ResolveError::TransferNotReady(id)) => {
                // Input not staged yet; the job stays pending
                debug!(job = %job.id, transfer = %id, "input transfer not staged; deferring");
                return Ok(());
            }
            Err(e) => {
                warn!(job = %job.id, "resolution failed: {e}");
                self.store.fail_job(job.id, FailureCause::SubmissionError)?;
                return Ok(());
            }
        };

        // Record temporary allocations before the DRM sees the paths, so a
        // crash cannot hand a second job different names.
        let dirs: Vec<PathBuf> = self.store.with_state(|s| {
            resolved
                .allocations
                .iter()
                .filter(|(id, _)| {
                    s.temporaries.get(id).map(|t| t.is_directory).unwrap_or(false)
                })
                .map(|(_, p)| p.clone())
                .collect()
        });
        for (id, path) in &resolved.allocations {
            self.store.allocate_temporary(*id, path.clone())?;
        }
        for dir in dirs {
            tokio::fs::create_dir_all(&dir).await?;
        }

        // Service-owned stdio defaults when no explicit target was given
        tokio::fs::create_dir_all(&self.config.stdio_dir).await?;
        let stdout_path = resolved
            .template
            .stdout_path
            .clone()
            .unwrap_or_else(|| self.config.stdio_dir.join(format!("{}.out", job.id)));
        let stderr_path = if job.join_stderr {
            None
        } else {
            resolved
                .template
                .stderr_path
                .clone()
                .or_else(|| Some(self.config.stdio_dir.join(format!("{}.err", job.id))))
        };
        resolved.template.stdout_path = Some(stdout_path.clone());
        resolved.template.stderr_path = stderr_path.clone();
        self.store.record_stdio(job.id, stdout_path, stderr_path)?;

        let mut backoff = Backoff::new(self.config.submit_attempts, self.config.retry_base);
        let drm_id = loop {
            match self.drm.submit(resolved.template.clone()).await {
                Ok(id) => break id,
                Err(e) if e.is_transient() => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(job = %job.id, "submit failed ({e}); retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(job = %job.id, "submit retries exhausted");
                        self.store.fail_job(job.id, FailureCause::DrmUnavailable)?;
                        return Ok(());
                    }
                },
                Err(e) => {
                    warn!(job = %job.id, "DRM rejected submission: {e}");
                    self.store.fail_job(job.id, FailureCause::SubmissionError)?;
                    return Ok(());
                }
            }
        };

        self.store.record_submission(job.id, &drm_id, self.clock.epoch_ms())?;
        info!(job = %job.id, drm_id = %drm_id, "submitted");
        Ok(())
    }

    /// Poll a bounded batch of in-flight DRM ids and apply transitions.
    async fn poll(&self) -> Result<(), EngineError> {
        let mut in_flight: Vec<(JobId, String)> = self.store.with_state(|s| {
            s.in_flight_jobs()
                .iter()
                .map(|j| (j.id, j.drm_id.clone().unwrap_or_default()))
                .collect()
        });
        if in_flight.is_empty() {
            return Ok(());
        }
        in_flight.sort_by_key(|(id, _)| *id);

        // Round-robin so a large fleet cannot starve the tail
        let start = {
            let mut cursor = self.poll_cursor.lock();
            let start = *cursor % in_flight.len();
            *cursor = (*cursor + self.config.poll_batch) % in_flight.len().max(1);
            start
        };
        let batch: Vec<(JobId, String)> = in_flight
            .iter()
            .cycle()
            .skip(start)
            .take(self.config.poll_batch.min(in_flight.len()))
            .cloned()
            .collect();

        for (job_id, drm_id) in batch {
            match self.drm.status(&drm_id).await {
                Ok(drm_status) => {
                    self.status_failures.lock().remove(&job_id);
                    let status: JobStatus = drm_status.into();
                    let current =
                        self.store.with_state(|s| s.jobs.get(&job_id).map(|j| j.status));
                    let Some(current) = current else { continue };
                    if current != status {
                        self.store.set_job_status(job_id, status)?;
                    }
                    if status.is_terminal() {
                        self.finalize(job_id, &drm_id).await?;
                    }
                }
                Err(e) if e.is_transient() => {
                    let failures = {
                        let mut map = self.status_failures.lock();
                        let n = map.entry(job_id).or_insert(0);
                        *n += 1;
                        *n
                    };
                    if failures >= self.config.status_failure_limit {
                        warn!(job = %job_id, "status retries exhausted: {e}");
                        self.status_failures.lock().remove(&job_id);
                        self.store.fail_job(job_id, FailureCause::DrmUnavailable)?;
                    }
                }
                Err(e) => {
                    warn!(job = %job_id, drm_id = %drm_id, "DRM lost the job: {e}");
                    self.store.fail_job(job_id, FailureCause::DrmUnavailable)?;
                }
            }
        }
        Ok(())
    }

    /// Terminal bookkeeping: record exit information and make output
    /// transfers retrievable. References are released at disposal, not
    /// here — the sweeper owns deletion.
    async fn finalize(&self, job_id: JobId, drm_id: &str) -> Result<(), EngineError> {
        let exit = match self.drm.wait(drm_id, 0).await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(job = %job_id, "exit information unavailable: {e}");
                ExitInfo::undetermined()
            }
        };
        self.store.record_exit(job_id, exit)?;

        let outputs: Vec<TransferId> = self
            .store
            .with_state(|s| s.jobs.get(&job_id).map(|j| j.referenced_outputs.clone()))
            .unwrap_or_default();
        for id in outputs {
            if tokio::fs::try_exists(id.as_str()).await.unwrap_or(false) {
                match self.store.set_transfer_status(&id, TransferStatus::ReadyToTransferBack) {
                    Ok(()) | Err(StoreError::NotFound) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn refresh_workflows(&self) -> Result<(), EngineError> {
        let updates: Vec<(WorkflowId, WorkflowStatus)> = self.store.with_state(|s| {
            s.workflows
                .values()
                .filter_map(|wf| {
                    let status = scheduler::workflow_status(s, wf);
                    (status != wf.status).then_some((wf.id, status))
                })
                .collect()
        });
        for (id, status) in updates {
            self.store.set_workflow_status(id, status)?;
        }
        Ok(())
    }

    // ---------- control operations ----------

    /// Hold a queued job or suspend a running one.
    pub async fn stop(&self, user: UserId, id: JobId) -> Result<(), EngineError> {
        let job = self.store.job(user, id)?;
        match &job.drm_id {
            Some(drm_id) if !job.status.is_terminal() => {
                self.drm_control(self.drm.hold(drm_id)).await?;
            }
            None if job.status == JobStatus::Pending => {
                // Not yet submitted: hold inside the engine
                self.store.set_job_status(id, JobStatus::UserOnHold)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Release a job previously stopped.
    pub async fn restart(&self, user: UserId, id: JobId) -> Result<(), EngineError> {
        let job = self.store.job(user, id)?;
        match &job.drm_id {
            Some(drm_id) if !job.status.is_terminal() => {
                self.drm_control(self.drm.release(drm_id)).await?;
            }
            None if job.status == JobStatus::UserOnHold => {
                self.store.set_job_status(id, JobStatus::Pending)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Terminate a job. The job stays visible (stdio still retrievable)
    /// until disposed.
    pub async fn kill(&self, user: UserId, id: JobId) -> Result<(), EngineError> {
        let job = self.store.job(user, id)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        if let Some(drm_id) = &job.drm_id {
            self.drm_control(self.drm.kill(drm_id)).await?;
        }
        self.store.set_job_status(id, JobStatus::Killed)?;
        self.store.record_exit(id, ExitInfo::aborted())?;
        self.settle()?;
        self.refresh_workflows()?;
        Ok(())
    }

    /// Kill if still live, then remove the job and release its references.
    pub async fn dispose(&self, user: UserId, id: JobId) -> Result<(), EngineError> {
        // Gate first; the rest is the system-level path
        self.store.job(user, id)?;
        self.force_dispose_job(id).await?;
        self.settle()?;
        self.refresh_workflows()?;
        Ok(())
    }

    /// Ungated disposal used by the sweeper and workflow teardown.
    pub(crate) async fn force_dispose_job(&self, id: JobId) -> Result<(), EngineError> {
        let Some(job) = self.store.with_state(|s| s.jobs.get(&id).cloned()) else {
            return Ok(());
        };
        if !job.is_terminal() {
            if let Some(drm_id) = &job.drm_id {
                // Best effort: the DRM may already have lost the job
                if let Err(e) = self.drm.kill(drm_id).await {
                    debug!(job = %id, "kill during dispose: {e}");
                }
            }
        }
        // Service-owned stdio files go with the job; explicit user targets stay
        if job.stdout_target.is_none() {
            remove_quietly(&job.stdout_path).await;
        }
        if job.stderr_target.is_none() {
            remove_quietly(&job.stderr_path).await;
        }
        self.store.dispose_job(id)?;
        info!(job = %id, "disposed");
        Ok(())
    }

    /// Cancel every non-terminal member job, then remove the workflow.
    pub async fn dispose_workflow(&self, user: UserId, id: WorkflowId) -> Result<(), EngineError> {
        self.store.workflow(user, id)?;
        self.force_dispose_workflow(id).await
    }

    pub(crate) async fn force_dispose_workflow(&self, id: WorkflowId) -> Result<(), EngineError> {
        let Some(job_ids) =
            self.store.with_state(|s| s.workflows.get(&id).map(|w| w.job_ids.clone()))
        else {
            return Ok(());
        };
        self.store.set_workflow_status(id, WorkflowStatus::DeletePending)?;
        for job_id in job_ids {
            self.force_dispose_job(job_id).await?;
        }
        self.store.dispose_workflow(id)?;
        info!(workflow = %id, "disposed");
        Ok(())
    }

    /// Block until every named job is terminal or the deadline passes.
    ///
    /// `timeout_secs < 0` waits forever; `0` checks once. Returns whether
    /// all jobs were terminal when the call returned. Disposed jobs count
    /// as terminal.
    pub async fn wait(
        &self,
        user: UserId,
        ids: &[JobId],
        timeout_secs: i64,
    ) -> Result<bool, EngineError> {
        for id in ids {
            match self.store.job(user, *id) {
                Ok(_) => {}
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let deadline = (timeout_secs > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(timeout_secs as u64));
        loop {
            let all_terminal = self.store.with_state(|s| {
                ids.iter().all(|id| s.jobs.get(id).map(|j| j.is_terminal()).unwrap_or(true))
            });
            if all_terminal {
                return Ok(true);
            }
            if timeout_secs == 0 {
                return Ok(false);
            }
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Ok(false);
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    // ---------- restart recovery ----------

    /// Reconcile persisted state against the DRM after a restart.
    ///
    /// Jobs with a recorded DRM id are re-polled (never re-submitted);
    /// jobs that crashed between submit and record stay `Pending` and are
    /// re-submitted — the at-least-once contract, idempotent by job id.
    /// Interrupted workflow disposals are re-driven to completion.
    pub async fn recover(&self) -> Result<(), EngineError> {
        let in_flight: Vec<(JobId, String)> = self.store.with_state(|s| {
            s.in_flight_jobs()
                .iter()
                .map(|j| (j.id, j.drm_id.clone().unwrap_or_default()))
                .collect()
        });
        if !in_flight.is_empty() {
            info!("reconciling {} in-flight jobs against the DRM", in_flight.len());
        }
        for (job_id, drm_id) in in_flight {
            match self.drm.status(&drm_id).await {
                Ok(drm_status) => {
                    let status: JobStatus = drm_status.into();
                    self.store.set_job_status(job_id, status)?;
                    if status.is_terminal() {
                        self.finalize(job_id, &drm_id).await?;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(job = %job_id, "DRM unreachable during recovery: {e}");
                }
                Err(e) => {
                    warn!(job = %job_id, "DRM lost the job across restart: {e}");
                    self.store.fail_job(job_id, FailureCause::DrmUnavailable)?;
                }
            }
        }

        let delete_pending: Vec<WorkflowId> = self.store.with_state(|s| {
            s.workflows
                .values()
                .filter(|w| w.status == WorkflowStatus::DeletePending)
                .map(|w| w.id)
                .collect()
        });
        for id in delete_pending {
            info!(workflow = %id, "resuming interrupted disposal");
            self.force_dispose_workflow(id).await?;
        }

        self.settle()?;
        self.refresh_workflows()?;
        Ok(())
    }

    /// Current time from the engine clock, for callers that schedule
    /// expirations consistently with the engine.
    pub fn now(&self) -> DateTime<Utc> {
        self.now_utc()
    }

    pub fn epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    async fn drm_control(
        &self,
        op: impl std::future::Future<Output = Result<(), DrmError>>,
    ) -> Result<(), EngineError> {
        op.await.map_err(|e| match e {
            DrmError::Unavailable(msg) => EngineError::DrmUnavailable(msg),
            other => EngineError::DrmUnavailable(other.to_string()),
        })
    }
}

async fn remove_quietly(path: &Option<PathBuf>) {
    if let Some(path) = path {
        let _ = tokio::fs::remove_file(path).await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
