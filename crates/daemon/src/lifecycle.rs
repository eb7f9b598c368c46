// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Daemon startup, recovery, and shutdown.
//!
//! Startup order: state dir + lock file, store open (snapshot + WAL
//! replay), engine recovery against the DRM, then the listener, engine
//! loop, and sweeper tasks. Shutdown drains the tasks and checkpoints the
//! store so the next start replays almost nothing.

use crate::env;
use crate::listener::{ListenCtx, Listener};
use crate::session::SessionRegistry;
use fs2::FileExt;
use gm_adapters::{DrmAdapter, LocalDrm};
use gm_core::SystemClock;
use gm_engine::{
    Engine, EngineConfig, EngineError, ResolveError, Sweeper, TransferCoordinator,
    TranslationTable,
};
use gm_storage::{Store, StoreError};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors from daemon startup and shutdown.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine a state directory (set GM_STATE_DIR)")]
    NoStateDir,

    #[error("another daemon already holds {0}")]
    AlreadyRunning(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("translation table: {0}")]
    Translations(#[from] ResolveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the daemon until shutdown is requested.
///
/// The DRM adapter is injected so deployments can wire a site adapter;
/// [`run_local`] wires the process-spawning default.
pub async fn run(drm: Arc<dyn DrmAdapter>) -> Result<(), LifecycleError> {
    let state_dir = env::state_dir()?;
    fs::create_dir_all(&state_dir)?;

    let lock_path = state_dir.join("gmd.lock");
    let lock_file = fs::File::create(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::AlreadyRunning(lock_path.clone()))?;

    let store = Arc::new(Store::open(&state_dir.join("store"))?);
    let table = match env::translation_file() {
        Some(path) => TranslationTable::load(&path)?,
        None => TranslationTable::new(),
    };
    let mut config = EngineConfig::new(&state_dir);
    if let Some(cap) = env::max_in_drm() {
        config.max_in_drm_per_user = cap;
    }
    let engine =
        Arc::new(Engine::new(Arc::clone(&store), drm, table, config, SystemClock));

    info!("recovering engine state");
    engine.recover().await?;

    let transfer_dir = state_dir.join("transfers");
    fs::create_dir_all(&transfer_dir)?;
    let coordinator = TransferCoordinator::new(Arc::clone(&store), transfer_dir);

    let shutdown = CancellationToken::new();
    let socket_path = state_dir.join("gmd.sock");
    let _ = fs::remove_file(&socket_path);
    let unix = UnixListener::bind(&socket_path)?;
    info!(socket = %socket_path.display(), "listening");

    let ctx = Arc::new(ListenCtx {
        store: Arc::clone(&store),
        engine: Arc::clone(&engine),
        coordinator,
        sessions: SessionRegistry::new(),
        shutdown: shutdown.clone(),
    });

    let engine_task =
        tokio::spawn(Arc::clone(&engine).run(shutdown.clone(), env::tick_interval()));
    let sweeper_task = tokio::spawn(
        Sweeper::new(Arc::clone(&engine)).run(shutdown.clone(), env::sweep_interval()),
    );
    let listener_task = tokio::spawn(Listener::new(unix, ctx).run());

    tokio::select! {
        _ = shutdown.cancelled() => info!("shutdown requested"),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            shutdown.cancel();
        }
    }

    let _ = tokio::join!(engine_task, sweeper_task, listener_task);
    if let Err(e) = store.checkpoint() {
        warn!("final checkpoint failed: {e}");
    }
    let _ = fs::remove_file(&socket_path);
    info!("daemon stopped");
    Ok(())
}

/// Run with the local process-spawning adapter.
pub async fn run_local() -> Result<(), LifecycleError> {
    run(Arc::new(LocalDrm::new())).await
}
