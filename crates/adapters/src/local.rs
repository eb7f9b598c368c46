// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Process-spawning adapter for deployments without a site DRM.
//!
//! Each submission forks the command directly on the service host with the
//! template's stdio routing. Hold and release are accepted but have no
//! effect — a forked process has no queue to wait in.

use crate::drm::{DrmAdapter, DrmError, DrmStatus, DrmTemplate};
use async_trait::async_trait;
use gm_core::ExitInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

struct LocalJob {
    status: DrmStatus,
    exit: Option<ExitInfo>,
    kill_tx: Option<oneshot::Sender<()>>,
    done: Arc<Notify>,
}

/// DRM adapter that runs jobs as local child processes.
#[derive(Clone, Default)]
pub struct LocalDrm {
    jobs: Arc<Mutex<HashMap<String, LocalJob>>>,
    next_id: Arc<AtomicU64>,
}

impl LocalDrm {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_exit(jobs: &Mutex<HashMap<String, LocalJob>>, id: &str, exit: ExitInfo) {
        let mut guard = jobs.lock();
        if let Some(job) = guard.get_mut(id) {
            job.status = match (&exit.exit_status, exit.exit_value) {
                (gm_core::ExitStatus::FinishedRegularly, Some(0)) => DrmStatus::Done,
                _ => DrmStatus::Failed,
            };
            job.exit = Some(exit);
            job.kill_tx = None;
            job.done.notify_waiters();
        }
    }

    fn spawn_child(template: &DrmTemplate) -> Result<tokio::process::Child, DrmError> {
        let program = template
            .command
            .first()
            .ok_or_else(|| DrmError::Rejected("empty command".into()))?;
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(&template.command[1..]);
        if let Some(dir) = &template.working_directory {
            cmd.current_dir(dir);
        }
        for (key, value) in &template.environment {
            cmd.env(key, value);
        }

        match &template.stdin_path {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .map_err(|e| DrmError::Rejected(format!("stdin {}: {e}", path.display())))?;
                cmd.stdin(Stdio::from(file));
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }

        let stdout = match &template.stdout_path {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .map_err(|e| DrmError::Rejected(format!("stdout {}: {e}", path.display())))?;
                Some(file)
            }
            None => None,
        };
        match &stdout {
            Some(file) => {
                let clone = file
                    .try_clone()
                    .map_err(|e| DrmError::Rejected(format!("stdout clone: {e}")))?;
                cmd.stdout(Stdio::from(clone));
            }
            None => {
                cmd.stdout(Stdio::null());
            }
        }

        if template.join_stderr {
            match stdout {
                Some(file) => cmd.stderr(Stdio::from(file)),
                None => cmd.stderr(Stdio::null()),
            };
        } else {
            match &template.stderr_path {
                Some(path) => {
                    let file = std::fs::File::create(path).map_err(|e| {
                        DrmError::Rejected(format!("stderr {}: {e}", path.display()))
                    })?;
                    cmd.stderr(Stdio::from(file));
                }
                None => {
                    cmd.stderr(Stdio::null());
                }
            }
        }

        cmd.kill_on_drop(true);
        cmd.spawn().map_err(|e| DrmError::Rejected(format!("spawn {program}: {e}")))
    }
}

#[async_trait]
impl DrmAdapter for LocalDrm {
    async fn submit(&self, template: DrmTemplate) -> Result<String, DrmError> {
        let mut child = Self::spawn_child(&template)?;
        let id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let done = Arc::new(Notify::new());
        let (kill_tx, kill_rx) = oneshot::channel();

        self.jobs.lock().insert(
            id.clone(),
            LocalJob {
                status: DrmStatus::Running,
                exit: None,
                kill_tx: Some(kill_tx),
                done: Arc::clone(&done),
            },
        );
        debug!(drm_id = %id, name = %template.name, "spawned local job");

        let jobs = Arc::clone(&self.jobs);
        let watch_id = id.clone();
        tokio::spawn(async move {
            let exit = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => exit_info_from_status(status),
                    Err(e) => {
                        warn!(drm_id = %watch_id, "wait failed: {e}");
                        ExitInfo::undetermined()
                    }
                },
                _ = kill_rx => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    ExitInfo::aborted()
                }
            };
            Self::record_exit(&jobs, &watch_id, exit);
        });

        Ok(id)
    }

    async fn status(&self, drm_id: &str) -> Result<DrmStatus, DrmError> {
        self.jobs
            .lock()
            .get(drm_id)
            .map(|j| j.status)
            .ok_or_else(|| DrmError::UnknownId(drm_id.to_string()))
    }

    async fn hold(&self, drm_id: &str) -> Result<(), DrmError> {
        if !self.jobs.lock().contains_key(drm_id) {
            return Err(DrmError::UnknownId(drm_id.to_string()));
        }
        warn!(drm_id, "hold has no effect on local processes");
        Ok(())
    }

    async fn release(&self, drm_id: &str) -> Result<(), DrmError> {
        if !self.jobs.lock().contains_key(drm_id) {
            return Err(DrmError::UnknownId(drm_id.to_string()));
        }
        Ok(())
    }

    async fn kill(&self, drm_id: &str) -> Result<(), DrmError> {
        let kill_tx = {
            let mut guard = self.jobs.lock();
            let job = guard
                .get_mut(drm_id)
                .ok_or_else(|| DrmError::UnknownId(drm_id.to_string()))?;
            job.kill_tx.take()
        };
        // Already terminal (or a concurrent kill won): idempotent success
        if let Some(tx) = kill_tx {
            let _ = tx.send(());
        }
        Ok(())
    }

    async fn wait(&self, drm_id: &str, timeout_secs: i64) -> Result<ExitInfo, DrmError> {
        let done = {
            let guard = self.jobs.lock();
            let job = guard
                .get(drm_id)
                .ok_or_else(|| DrmError::UnknownId(drm_id.to_string()))?;
            if let Some(exit) = &job.exit {
                return Ok(exit.clone());
            }
            Arc::clone(&job.done)
        };

        if timeout_secs == 0 {
            return Err(DrmError::WaitTimeout);
        }

        let wait_loop = async {
            loop {
                let notified = done.notified();
                if let Some(exit) = self.jobs.lock().get(drm_id).and_then(|j| j.exit.clone()) {
                    return exit;
                }
                notified.await;
            }
        };

        if timeout_secs < 0 {
            Ok(wait_loop.await)
        } else {
            tokio::time::timeout(std::time::Duration::from_secs(timeout_secs as u64), wait_loop)
                .await
                .map_err(|_| DrmError::WaitTimeout)
        }
    }
}

fn exit_info_from_status(status: std::process::ExitStatus) -> ExitInfo {
    if let Some(code) = status.code() {
        return ExitInfo::finished(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitInfo::signalled(signal_name(signal));
        }
    }
    ExitInfo::undetermined()
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    match signal {
        1 => "SIGHUP".into(),
        2 => "SIGINT".into(),
        3 => "SIGQUIT".into(),
        6 => "SIGABRT".into(),
        9 => "SIGKILL".into(),
        11 => "SIGSEGV".into(),
        13 => "SIGPIPE".into(),
        15 => "SIGTERM".into(),
        other => format!("SIG{other}"),
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
