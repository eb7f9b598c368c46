// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use super::*;
use crate::resolver::TranslationTable;
use crate::runtime::EngineConfig;
use gm_core::{
    CommandToken, ErrorKind, FakeClock, JobSpec, Transfer, TransferDirection, TransferId,
    TransferStatus, UserId,
};
use gm_adapters::FakeDrm;
use gm_storage::Store;
use std::time::Duration as StdDuration;
use tempfile::TempDir;

struct Fixture {
    sweeper: Sweeper<FakeClock>,
    engine: Arc<Engine<FakeClock>>,
    store: Arc<Store>,
    clock: FakeClock,
    user: UserId,
    dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(&dir.path().join("state")).unwrap());
    let user = store.register_user("alice", 0).unwrap();
    let clock = FakeClock::new();
    let engine = Arc::new(Engine::new(
        Arc::clone(&store),
        Arc::new(FakeDrm::auto_completing()),
        TranslationTable::new(),
        EngineConfig::new(dir.path()),
        clock.clone(),
    ));
    let sweeper = Sweeper::new(Arc::clone(&engine));
    Fixture { sweeper, engine, store, clock, user, dir }
}

fn hours(h: u64) -> StdDuration {
    StdDuration::from_secs(h * 3600)
}

fn transfer_at(f: &Fixture, server_path: &std::path::Path, hours_to_live: i64) -> TransferId {
    let id = TransferId::new(server_path.display().to_string());
    f.store
        .register_transfer(Transfer {
            id: id.clone(),
            user_id: f.user,
            client_path: "/client/in".into(),
            client_paths: None,
            direction: TransferDirection::In,
            status: TransferStatus::OnCompute,
            expires_at: f.engine.now() + chrono::Duration::hours(hours_to_live),
            registered_at_ms: 0,
            refs: Default::default(),
        })
        .unwrap();
    id
}

#[tokio::test]
async fn expired_jobs_are_disposed() {
    let f = fixture();
    let mut spec = JobSpec::from_literals(["true"]);
    spec.disposal_hours = 1;
    let id = f.store.submit_job(f.user, spec, f.engine.now(), 0).unwrap();

    f.sweeper.sweep_once().await.unwrap();
    assert!(f.store.job(f.user, id).is_ok(), "not yet expired");

    f.clock.advance(hours(2));
    f.sweeper.sweep_once().await.unwrap();
    assert_eq!(f.store.job(f.user, id).unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn transfer_bytes_survive_while_referenced() {
    let f = fixture();
    let path = f.dir.path().join("t1.dat");
    std::fs::write(&path, b"payload").unwrap();
    let tid = transfer_at(&f, &path, 1);

    let spec = JobSpec::new(vec![
        CommandToken::literal("cat"),
        CommandToken::Transfer(tid.clone()),
    ])
    .referenced_inputs(vec![tid.clone()])
    .disposal_hours(1000);
    let job = f.store.submit_job(f.user, spec, f.engine.now(), 0).unwrap();

    // Cancelled (expiration = now) but still referenced by a live job
    f.store.set_transfer_expiration(&tid, f.engine.now()).unwrap();
    f.sweeper.sweep_once().await.unwrap();
    assert!(path.exists(), "referenced bytes must not be deleted");
    assert!(f.store.transfer(f.user, &tid).is_ok());

    // Disposing the job releases the reference; the sweeper may now delete
    f.engine.dispose(f.user, job).await.unwrap();
    f.sweeper.sweep_once().await.unwrap();
    assert!(!path.exists());
    assert_eq!(f.store.transfer(f.user, &tid).unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn unexpired_transfers_survive_even_unreferenced() {
    let f = fixture();
    let path = f.dir.path().join("t2.dat");
    std::fs::write(&path, b"payload").unwrap();
    let tid = transfer_at(&f, &path, 24);

    f.sweeper.sweep_once().await.unwrap();
    assert!(path.exists());
    assert!(f.store.transfer(f.user, &tid).is_ok());
}

#[tokio::test]
async fn expired_workflows_are_disposed_with_their_jobs() {
    let f = fixture();
    let spec = gm_core::WorkflowSpec::new(vec![JobSpec::from_literals(["true"])])
        .disposal_hours(1);
    let wf = f.store.submit_workflow(f.user, spec, f.engine.now(), 0).unwrap();

    f.clock.advance(hours(2));
    f.sweeper.sweep_once().await.unwrap();

    assert_eq!(f.store.workflow(f.user, wf).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(f.store.list_jobs(f.user).is_empty());
}

#[tokio::test]
async fn temporaries_vanish_after_their_last_job() {
    let f = fixture();
    let decl = gm_core::TemporaryDecl::file(".dat");
    let spec = gm_core::WorkflowSpec::new(vec![JobSpec::new(vec![
        CommandToken::literal("touch"),
        CommandToken::Temporary(decl.id),
    ])])
    .temporaries(vec![decl.clone()])
    .disposal_hours(1);
    let wf = f.store.submit_workflow(f.user, spec, f.engine.now(), 0).unwrap();

    // Simulate the resolver's allocation with real bytes on disk
    let tmp_path = f.dir.path().join("scratch.dat");
    std::fs::write(&tmp_path, b"x").unwrap();
    f.store.allocate_temporary(decl.id, tmp_path.clone()).unwrap();

    f.sweeper.sweep_once().await.unwrap();
    assert!(tmp_path.exists(), "referenced temporary must survive");

    f.engine.dispose_workflow(f.user, wf).await.unwrap();
    f.sweeper.sweep_once().await.unwrap();
    assert!(!tmp_path.exists());
    assert!(f.store.unreferenced_temporaries().is_empty());
}
