// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Shared harness: an in-process daemon stack with a pluggable DRM.

use gm_adapters::{DrmAdapter, FakeDrm, LocalDrm};
use gm_core::{FakeClock, JobId, JobSpec, JobStatus, UserId};
use gm_daemon::{handle_request, ListenCtx, SessionRegistry};
use gm_engine::{Engine, EngineConfig, Sweeper, TransferCoordinator, TranslationTable};
use gm_storage::Store;
use gm_wire::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub struct Harness {
    pub ctx: Arc<ListenCtx<FakeClock>>,
    pub engine: Arc<Engine<FakeClock>>,
    pub sweeper: Sweeper<FakeClock>,
    pub clock: FakeClock,
    pub fake_drm: Option<FakeDrm>,
    pub dir: TempDir,
}

impl Harness {
    /// Stack over the process-spawning adapter (real commands run).
    pub fn local() -> Self {
        Self::build(Arc::new(LocalDrm::new()), None)
    }

    /// Stack over the fake adapter (tests drive every transition).
    pub fn fake() -> Self {
        let drm = FakeDrm::new();
        Self::build(Arc::new(drm.clone()), Some(drm))
    }

    fn build(drm: Arc<dyn DrmAdapter>, fake_drm: Option<FakeDrm>) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("store")).unwrap());
        let clock = FakeClock::new();
        let engine = Arc::new(Engine::new(
            Arc::clone(&store),
            drm,
            TranslationTable::new(),
            EngineConfig::new(dir.path()),
            clock.clone(),
        ));
        let sweeper = Sweeper::new(Arc::clone(&engine));
        let coordinator =
            TransferCoordinator::new(Arc::clone(&store), dir.path().join("transfers"));
        std::fs::create_dir_all(dir.path().join("transfers")).unwrap();
        let ctx = Arc::new(ListenCtx {
            store,
            engine: Arc::clone(&engine),
            coordinator,
            sessions: SessionRegistry::new(),
            shutdown: CancellationToken::new(),
        });
        Self { ctx, engine, sweeper, clock, fake_drm, dir }
    }

    pub async fn request(&self, request: Request) -> Response {
        handle_request(&self.ctx, request).await
    }

    pub async fn register(&self, login: &str) -> UserId {
        match self.request(Request::RegisterUser { login: login.into() }).await {
            Response::Registered { user } => user,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    pub async fn submit(&self, user: UserId, spec: JobSpec) -> JobId {
        match self.request(Request::SubmitJob { user, spec }).await {
            Response::JobSubmitted { id } => id,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    pub async fn status(&self, user: UserId, id: JobId) -> JobStatus {
        match self.request(Request::JobStatus { user, id }).await {
            Response::JobStatus { status } => status,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    pub fn drm_id(&self, user: UserId, id: JobId) -> String {
        self.ctx.store.job(user, id).unwrap().drm_id.unwrap()
    }

    /// Tick the engine until the predicate holds or the deadline passes.
    pub async fn run_until<F>(&self, mut done: F)
    where
        F: FnMut() -> bool,
    {
        for _ in 0..250 {
            if done() {
                return;
            }
            self.engine.tick().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within the tick budget");
    }

    /// Tick until the job reaches the given status.
    pub async fn run_until_status(&self, id: JobId, status: JobStatus) {
        let store = Arc::clone(&self.ctx.store);
        self.run_until(|| {
            store
                .with_state(|s| s.jobs.get(&id).map(|j| j.status))
                .map(|s| s == status)
                .unwrap_or(false)
        })
        .await;
    }
}
