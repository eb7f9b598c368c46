// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Single-job lifecycle against the local process adapter.

use super::support::Harness;
use gm_core::{ExitStatus, JobSpec, JobStatus};
use gm_wire::{Request, Response};

#[tokio::test]
async fn echo_runs_to_done_with_retrievable_output() {
    let h = Harness::local();
    let user = h.register("alice").await;

    let mut spec = JobSpec::from_literals(["echo", "hi"]);
    spec.disposal_hours = 1;
    let id = h.submit(user, spec).await;
    assert_eq!(h.status(user, id).await, JobStatus::Pending);

    h.run_until_status(id, JobStatus::Done).await;

    match h.request(Request::ExitInfo { user, id }).await {
        Response::ExitInfo { exit: Some(exit) } => {
            assert_eq!(exit.exit_status, ExitStatus::FinishedRegularly);
            assert_eq!(exit.exit_value, Some(0));
            assert_eq!(exit.terminating_signal, "");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let response = h.request(Request::StdoutReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: Some("hi\n".into()) });
    let response = h.request(Request::StdoutReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: None });
}

#[tokio::test]
async fn nonzero_exit_surfaces_in_exit_info() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let id = h.submit(user, JobSpec::from_literals(["sh", "-c", "exit 3"])).await;

    h.run_until_status(id, JobStatus::Failed).await;

    match h.request(Request::ExitInfo { user, id }).await {
        Response::ExitInfo { exit: Some(exit) } => {
            assert_eq!(exit.exit_status, ExitStatus::FinishedRegularly);
            assert_eq!(exit.exit_value, Some(3));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn wait_blocks_until_terminal() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let id = h.submit(user, JobSpec::from_literals(["true"])).await;

    // Drive the engine in the background so wait can observe progress
    let engine = std::sync::Arc::clone(&h.engine);
    let ticker = tokio::spawn(async move {
        for _ in 0..200 {
            engine.tick().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    });

    let response = h.request(Request::Wait { user, ids: vec![id], timeout_secs: 10 }).await;
    assert_eq!(response, Response::WaitDone { all_terminal: true });
    assert_eq!(h.status(user, id).await, JobStatus::Done);
    ticker.abort();
}

#[tokio::test]
async fn join_stderr_merges_the_streams() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let mut spec = JobSpec::from_literals(["sh", "-c", "echo both >&2"]);
    spec.join_stderr = true;
    let id = h.submit(user, spec).await;

    h.run_until_status(id, JobStatus::Done).await;

    let response = h.request(Request::StdoutReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: Some("both\n".into()) });
    let response = h.request(Request::StderrReadLine { user, id }).await;
    assert_eq!(response, Response::Line { line: None });
}
