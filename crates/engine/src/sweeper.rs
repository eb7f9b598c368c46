// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Expiration sweeper.
//!
//! A periodic reaper: disposes jobs and workflows past their disposal
//! deadline, deletes server-side bytes of expired transfers once no live
//! job references them, and removes temporaries whose last referencing
//! job is gone. Each entity is processed through its own store call — no
//! lock spans more than one entity.

use crate::error::EngineError;
use crate::runtime::Engine;
use gm_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background reaper over the engine's store.
pub struct Sweeper<C: Clock> {
    engine: Arc<Engine<C>>,
}

impl<C: Clock> Sweeper<C> {
    pub fn new(engine: Arc<Engine<C>>) -> Self {
        Self { engine }
    }

    /// Run until cancelled, sweeping at the given cadence.
    pub async fn run(self, cancel: CancellationToken, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!("sweep failed: {e}");
                    }
                }
            }
        }
        debug!("sweeper stopped");
    }

    /// One full pass: jobs, then workflows, then transfers, then
    /// temporaries.
    pub async fn sweep_once(&self) -> Result<(), EngineError> {
        let store = self.engine.store();
        let now = self.engine.now();

        for id in store.expired_jobs(now) {
            info!(job = %id, "disposal timeout elapsed");
            self.engine.force_dispose_job(id).await?;
        }

        for id in store.expired_workflows(now) {
            info!(workflow = %id, "disposal timeout elapsed");
            self.engine.force_dispose_workflow(id).await?;
        }

        for transfer in store.sweepable_transfers(now) {
            let path = transfer.id.as_str();
            let removed = if transfer.is_directory() {
                tokio::fs::remove_dir_all(path).await
            } else {
                tokio::fs::remove_file(path).await
            };
            match removed {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(transfer = %transfer.id, "could not delete bytes: {e}");
                    continue;
                }
            }
            store.sweep_transfer(&transfer.id)?;
            info!(transfer = %transfer.id, "swept");
        }

        for temporary in store.unreferenced_temporaries() {
            if let Some(path) = &temporary.concrete_path {
                let removed = if temporary.is_directory {
                    tokio::fs::remove_dir_all(path).await
                } else {
                    tokio::fs::remove_file(path).await
                };
                if let Err(e) = removed {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(temporary = %temporary.id, "could not delete path: {e}");
                        continue;
                    }
                }
            }
            store.remove_temporary(temporary.id)?;
            debug!(temporary = %temporary.id, "removed");
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
