// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Kill-then-dispose lifecycle against the local process adapter.

use super::support::Harness;
use gm_core::{ErrorKind, ExitStatus, JobSpec, JobStatus};
use gm_wire::{Request, Response};

#[tokio::test]
async fn killed_job_stays_visible_until_disposed() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let id = h
        .submit(user, JobSpec::from_literals(["sh", "-c", "echo started; sleep 30"]))
        .await;

    h.run_until_status(id, JobStatus::Running).await;

    assert_eq!(h.request(Request::Kill { user, id }).await, Response::Ok);
    assert_eq!(h.status(user, id).await, JobStatus::Killed);

    match h.request(Request::ExitInfo { user, id }).await {
        Response::ExitInfo { exit: Some(exit) } => {
            assert_eq!(exit.exit_status, ExitStatus::Aborted);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    // Partial output written before the kill is still readable
    let mut line = None;
    for _ in 0..50 {
        match h.request(Request::StdoutReadLine { user, id }).await {
            Response::Line { line: Some(text) } => {
                line = Some(text);
                break;
            }
            Response::Line { line: None } => {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
    assert_eq!(line.as_deref(), Some("started\n"));

    // Killing again is harmless
    assert_eq!(h.request(Request::Kill { user, id }).await, Response::Ok);

    assert_eq!(h.request(Request::Dispose { user, id }).await, Response::Ok);
    match h.request(Request::JobStatus { user, id }).await {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
        other => panic!("expected not_found, got {other:?}"),
    }
}

#[tokio::test]
async fn dispose_implies_kill_for_a_running_job() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let id = h.submit(user, JobSpec::from_literals(["sleep", "30"])).await;
    h.run_until_status(id, JobStatus::Running).await;

    assert_eq!(h.request(Request::Dispose { user, id }).await, Response::Ok);
    match h.request(Request::JobStatus { user, id }).await {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
        other => panic!("expected not_found, got {other:?}"),
    }
}

#[tokio::test]
async fn dispose_removes_service_owned_stdio_files() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let id = h.submit(user, JobSpec::from_literals(["echo", "bye"])).await;
    h.run_until_status(id, JobStatus::Done).await;

    let stdout = h.ctx.store.job(user, id).unwrap().stdout_path.unwrap();
    assert!(stdout.exists());

    assert_eq!(h.request(Request::Dispose { user, id }).await, Response::Ok);
    assert!(!stdout.exists());
}

#[tokio::test]
async fn stop_holds_an_unsubmitted_job() {
    let h = Harness::fake();
    let user = h.register("alice").await;
    let id = h.submit(user, JobSpec::from_literals(["true"])).await;

    // Held before the engine ever dispatches it
    assert_eq!(h.request(Request::Stop { user, id }).await, Response::Ok);
    h.engine.tick().await.unwrap();
    assert_eq!(h.status(user, id).await, JobStatus::UserOnHold);
    assert_eq!(h.fake_drm.as_ref().unwrap().submitted_count(), 0);

    // Release lets it through
    assert_eq!(h.request(Request::Restart { user, id }).await, Response::Ok);
    h.run_until_status(id, JobStatus::QueuedActive).await;
}
