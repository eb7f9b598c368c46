// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use super::*;
use crate::session::SessionRegistry;
use gm_adapters::{DrmStatus, FakeDrm};
use gm_core::{
    ErrorKind, ExitInfo, FakeClock, JobId, JobSpec, JobStatus, TransferDirection, UserId,
};
use gm_engine::{EngineConfig, TranslationTable};
use gm_wire::{Request, Response};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    ctx: Arc<ListenCtx<FakeClock>>,
    drm: FakeDrm,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(&dir.path().join("store")).unwrap());
    let drm = FakeDrm::new();
    let engine = Arc::new(Engine::new(
        Arc::clone(&store),
        Arc::new(drm.clone()),
        TranslationTable::new(),
        EngineConfig::new(dir.path()),
        FakeClock::new(),
    ));
    let coordinator =
        TransferCoordinator::new(Arc::clone(&store), dir.path().join("transfers"));
    std::fs::create_dir_all(dir.path().join("transfers")).unwrap();
    let ctx = Arc::new(ListenCtx {
        store,
        engine,
        coordinator,
        sessions: SessionRegistry::new(),
        shutdown: CancellationToken::new(),
    });
    Fixture { ctx, drm, _dir: dir }
}

async fn register(f: &Fixture, login: &str) -> UserId {
    match handle_request(&f.ctx, Request::RegisterUser { login: login.into() }).await {
        Response::Registered { user } => user,
        other => panic!("unexpected response: {other:?}"),
    }
}

async fn submit(f: &Fixture, user: UserId, spec: JobSpec) -> JobId {
    match handle_request(&f.ctx, Request::SubmitJob { user, spec }).await {
        Response::JobSubmitted { id } => id,
        other => panic!("unexpected response: {other:?}"),
    }
}

fn expect_error(response: Response, kind: ErrorKind) {
    match response {
        Response::Error { kind: actual, .. } => assert_eq!(actual, kind),
        other => panic!("expected {kind} error, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_pongs() {
    let f = fixture();
    assert_eq!(handle_request(&f.ctx, Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn register_is_idempotent_per_login() {
    let f = fixture();
    let a = register(&f, "alice").await;
    let b = register(&f, "alice").await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn submit_job_then_query_status() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let id = submit(&f, user, JobSpec::from_literals(["echo", "hi"])).await;

    let response = handle_request(&f.ctx, Request::JobStatus { user, id }).await;
    assert_eq!(response, Response::JobStatus { status: JobStatus::Pending });

    f.ctx.engine.tick().await.unwrap();
    let response = handle_request(&f.ctx, Request::JobStatus { user, id }).await;
    assert_eq!(response, Response::JobStatus { status: JobStatus::QueuedActive });
}

#[tokio::test]
async fn foreign_jobs_are_unauthorized_without_leaking_state() {
    let f = fixture();
    let alice = register(&f, "alice").await;
    let mallory = register(&f, "mallory").await;
    let id = submit(&f, alice, JobSpec::from_literals(["true"])).await;

    for request in [
        Request::JobStatus { user: mallory, id },
        Request::ExitInfo { user: mallory, id },
        Request::StdoutReadLine { user: mallory, id },
        Request::StderrReadLine { user: mallory, id },
        Request::Kill { user: mallory, id },
        Request::Dispose { user: mallory, id },
    ] {
        expect_error(handle_request(&f.ctx, request).await, ErrorKind::Unauthorized);
    }

    // Nothing changed for the owner
    let response = handle_request(&f.ctx, Request::JobStatus { user: alice, id }).await;
    assert_eq!(response, Response::JobStatus { status: JobStatus::Pending });
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let response = handle_request(
        &f.ctx,
        Request::JobStatus { user, id: JobId::from_string("job-missing") },
    )
    .await;
    expect_error(response, ErrorKind::NotFound);
}

#[tokio::test]
async fn exit_info_flows_after_completion() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let id = submit(&f, user, JobSpec::from_literals(["true"])).await;

    f.ctx.engine.tick().await.unwrap();
    let drm_id = f.ctx.store.job(user, id).unwrap().drm_id.unwrap();
    f.drm.complete(&drm_id, ExitInfo::finished(0));
    f.ctx.engine.tick().await.unwrap();

    match handle_request(&f.ctx, Request::ExitInfo { user, id }).await {
        Response::ExitInfo { exit: Some(exit) } => {
            assert_eq!(exit.exit_status, gm_core::ExitStatus::FinishedRegularly);
            assert_eq!(exit.exit_value, Some(0));
            assert!(exit.terminating_signal.is_empty());
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn stdout_lines_stream_through_the_session_reader() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let id = submit(&f, user, JobSpec::from_literals(["echo", "hi"])).await;
    f.ctx.engine.tick().await.unwrap();

    // The DRM (faked here) writes the stdout file the engine allocated
    let stdout = f.ctx.store.job(user, id).unwrap().stdout_path.unwrap();
    std::fs::write(&stdout, "hi\n").unwrap();

    let response = handle_request(&f.ctx, Request::StdoutReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: Some("hi\n".into()) });
    let response = handle_request(&f.ctx, Request::StdoutReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: None });
}

#[tokio::test]
async fn stderr_uses_the_same_gate_and_its_own_file() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let id = submit(&f, user, JobSpec::from_literals(["true"])).await;
    f.ctx.engine.tick().await.unwrap();

    let stderr = f.ctx.store.job(user, id).unwrap().stderr_path.unwrap();
    std::fs::write(&stderr, "oops\n").unwrap();

    let response = handle_request(&f.ctx, Request::StderrReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: Some("oops\n".into()) });
}

#[tokio::test]
async fn joined_stderr_reads_as_empty() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let mut spec = JobSpec::from_literals(["true"]);
    spec.join_stderr = true;
    let id = submit(&f, user, spec).await;
    f.ctx.engine.tick().await.unwrap();

    let response = handle_request(&f.ctx, Request::StderrReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: None });
}

#[tokio::test]
async fn kill_then_dispose_scenario() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let id = submit(&f, user, JobSpec::from_literals(["sleep", "30"])).await;
    f.ctx.engine.tick().await.unwrap();
    let drm_id = f.ctx.store.job(user, id).unwrap().drm_id.unwrap();
    f.drm.set_status(&drm_id, DrmStatus::Running);

    assert_eq!(handle_request(&f.ctx, Request::Kill { user, id }).await, Response::Ok);
    let response = handle_request(&f.ctx, Request::JobStatus { user, id }).await;
    assert_eq!(response, Response::JobStatus { status: JobStatus::Killed });

    // Stdio is still retrievable after the kill
    let stdout = f.ctx.store.job(user, id).unwrap().stdout_path.unwrap();
    std::fs::write(&stdout, "partial\n").unwrap();
    let response = handle_request(&f.ctx, Request::StdoutReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: Some("partial\n".into()) });

    assert_eq!(handle_request(&f.ctx, Request::Dispose { user, id }).await, Response::Ok);
    let response = handle_request(&f.ctx, Request::JobStatus { user, id }).await;
    expect_error(response, ErrorKind::NotFound);
}

#[tokio::test]
async fn transfer_lifecycle_over_the_protocol() {
    let f = fixture();
    let user = register(&f, "alice").await;

    let server_path = match handle_request(
        &f.ctx,
        Request::RegisterTransfer {
            user,
            client_path: "/client/in.dat".into(),
            client_paths: None,
            direction: TransferDirection::In,
            disposal_hours: 24,
        },
    )
    .await
    {
        Response::TransferRegistered { server_path } => server_path,
        other => panic!("unexpected response: {other:?}"),
    };

    let response = handle_request(
        &f.ctx,
        Request::TransferWrite {
            user,
            server_path: server_path.clone(),
            bytes: b"payload\n".to_vec(),
            eof: true,
        },
    )
    .await;
    assert_eq!(response, Response::Ok);

    match handle_request(
        &f.ctx,
        Request::TransferRead { user, server_path: server_path.clone(), offset: 0, max_len: 64 },
    )
    .await
    {
        Response::Bytes { bytes } => assert_eq!(bytes, b"payload\n"),
        other => panic!("unexpected response: {other:?}"),
    }

    match handle_request(&f.ctx, Request::TransferInfo { user, server_path: server_path.clone() })
        .await
    {
        Response::TransferInfo { info } => {
            assert_eq!(info.client_path, "/client/in.dat");
            assert_eq!(info.status, gm_core::TransferStatus::OnCompute);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    assert_eq!(
        handle_request(&f.ctx, Request::CancelTransfer { user, server_path }).await,
        Response::Ok
    );
}

#[tokio::test]
async fn cyclic_workflows_are_rejected_with_a_typed_error() {
    let f = fixture();
    let user = register(&f, "alice").await;
    let spec = gm_core::WorkflowSpec::new(vec![
        JobSpec::from_literals(["true"]),
        JobSpec::from_literals(["true"]),
    ])
    .dependencies(vec![
        (gm_core::WorkflowElement::Job(0), gm_core::WorkflowElement::Job(1)),
        (gm_core::WorkflowElement::Job(1), gm_core::WorkflowElement::Job(0)),
    ]);

    let response = handle_request(&f.ctx, Request::SubmitWorkflow { user, spec }).await;
    expect_error(response, ErrorKind::WorkflowCyclic);
}

#[tokio::test]
async fn shutdown_cancels_the_daemon_token() {
    let f = fixture();
    assert!(!f.ctx.shutdown.is_cancelled());
    assert_eq!(handle_request(&f.ctx, Request::Shutdown).await, Response::Ok);
    assert!(f.ctx.shutdown.is_cancelled());
}
