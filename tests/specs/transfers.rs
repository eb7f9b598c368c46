// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Transfer lifecycle: staging, reference-held survival, and garbage
//! collection.

use super::support::Harness;
use gm_core::{
    CommandToken, ErrorKind, ExitInfo, JobSpec, JobStatus, TransferDirection, TransferId,
    TransferStatus, UserId,
};
use gm_wire::{Request, Response};

async fn register_input(h: &Harness, user: UserId) -> TransferId {
    match h
        .request(Request::RegisterTransfer {
            user,
            client_path: "/client/in.dat".into(),
            client_paths: None,
            direction: TransferDirection::In,
            disposal_hours: 24,
        })
        .await
    {
        Response::TransferRegistered { server_path } => server_path,
        other => panic!("unexpected response: {other:?}"),
    }
}

async fn transfer_status(h: &Harness, user: UserId, id: &TransferId) -> TransferStatus {
    match h.request(Request::TransferInfo { user, server_path: id.clone() }).await {
        Response::TransferInfo { info } => info.status,
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn staged_bytes_become_on_compute() {
    let h = Harness::fake();
    let user = h.register("alice").await;
    let id = register_input(&h, user).await;
    assert_eq!(transfer_status(&h, user, &id).await, TransferStatus::OnClient);

    let response = h
        .request(Request::TransferWrite {
            user,
            server_path: id.clone(),
            bytes: b"first line\n".to_vec(),
            eof: false,
        })
        .await;
    assert_eq!(response, Response::Ok);
    assert_eq!(transfer_status(&h, user, &id).await, TransferStatus::Transferring);

    let response = h
        .request(Request::TransferWrite {
            user,
            server_path: id.clone(),
            bytes: b"second line\n".to_vec(),
            eof: true,
        })
        .await;
    assert_eq!(response, Response::Ok);
    assert_eq!(transfer_status(&h, user, &id).await, TransferStatus::OnCompute);

    assert_eq!(
        std::fs::read_to_string(id.as_str()).unwrap(),
        "first line\nsecond line\n"
    );
}

#[tokio::test]
async fn job_is_deferred_until_inputs_are_staged() {
    let h = Harness::fake();
    let drm = h.fake_drm.clone().unwrap();
    let user = h.register("alice").await;
    let id = register_input(&h, user).await;

    let spec = JobSpec::new(vec![
        CommandToken::literal("cat"),
        CommandToken::Transfer(id.clone()),
    ])
    .referenced_inputs(vec![id.clone()]);
    let job = h.submit(user, spec).await;

    // Not staged yet: the engine must not submit
    h.engine.tick().await.unwrap();
    h.engine.tick().await.unwrap();
    assert_eq!(h.status(user, job).await, JobStatus::Pending);
    assert_eq!(drm.submitted_count(), 0);

    h.request(Request::TransferWrite {
        user,
        server_path: id.clone(),
        bytes: b"data\n".to_vec(),
        eof: true,
    })
    .await;
    h.run_until_status(job, JobStatus::QueuedActive).await;
    // The resolved command carries the concrete server path
    assert_eq!(drm.submitted_templates()[0].command[1], id.as_str());
}

#[tokio::test]
async fn cancelled_transfer_survives_until_its_job_is_disposed() {
    let h = Harness::fake();
    let drm = h.fake_drm.clone().unwrap();
    let user = h.register("alice").await;
    let id = register_input(&h, user).await;
    h.request(Request::TransferWrite {
        user,
        server_path: id.clone(),
        bytes: b"payload\n".to_vec(),
        eof: true,
    })
    .await;

    let spec = JobSpec::new(vec![
        CommandToken::literal("cat"),
        CommandToken::Transfer(id.clone()),
    ])
    .referenced_inputs(vec![id.clone()]);
    let job = h.submit(user, spec).await;
    h.run_until_status(job, JobStatus::QueuedActive).await;

    // Cancel while the job still references the transfer
    let response =
        h.request(Request::CancelTransfer { user, server_path: id.clone() }).await;
    assert_eq!(response, Response::Ok);

    h.sweeper.sweep_once().await.unwrap();
    assert!(std::path::Path::new(id.as_str()).exists(), "bytes must survive the reference");

    // Terminate and dispose the job; only then may the sweeper delete
    drm.complete(&h.drm_id(user, job), ExitInfo::finished(0));
    h.run_until_status(job, JobStatus::Done).await;
    h.sweeper.sweep_once().await.unwrap();
    assert!(std::path::Path::new(id.as_str()).exists(), "terminal is not disposed");

    assert_eq!(h.request(Request::Dispose { user, id: job }).await, Response::Ok);
    h.sweeper.sweep_once().await.unwrap();
    assert!(!std::path::Path::new(id.as_str()).exists());

    let response = h.request(Request::TransferInfo { user, server_path: id }).await;
    match response {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
        other => panic!("expected not_found, got {other:?}"),
    }
}

#[tokio::test]
async fn output_transfers_become_ready_after_the_job() {
    let h = Harness::fake();
    let drm = h.fake_drm.clone().unwrap();
    let user = h.register("alice").await;
    let out = match h
        .request(Request::RegisterTransfer {
            user,
            client_path: "/client/out.dat".into(),
            client_paths: None,
            direction: TransferDirection::Out,
            disposal_hours: 24,
        })
        .await
    {
        Response::TransferRegistered { server_path } => server_path,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(transfer_status(&h, user, &out).await, TransferStatus::DoesNotExist);

    let spec = JobSpec::new(vec![
        CommandToken::literal("produce"),
        CommandToken::Transfer(out.clone()),
    ])
    .referenced_outputs(vec![out.clone()]);
    let job = h.submit(user, spec).await;
    h.run_until_status(job, JobStatus::QueuedActive).await;

    // The job (faked) writes its output, then terminates
    std::fs::write(out.as_str(), b"result\n").unwrap();
    drm.complete(&h.drm_id(user, job), ExitInfo::finished(0));
    h.run_until_status(job, JobStatus::Done).await;

    assert_eq!(transfer_status(&h, user, &out).await, TransferStatus::ReadyToTransferBack);
    match h
        .request(Request::TransferRead { user, server_path: out, offset: 0, max_len: 64 })
        .await
    {
        Response::Bytes { bytes } => assert_eq!(bytes, b"result\n"),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn transfers_are_listed_per_user() {
    let h = Harness::fake();
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let id = register_input(&h, alice).await;

    match h.request(Request::ListTransfers { user: alice }).await {
        Response::Transfers { transfers } => {
            assert_eq!(transfers.len(), 1);
            assert_eq!(transfers[0].server_path, id);
        }
        other => panic!("unexpected response: {other:?}"),
    }
    match h.request(Request::ListTransfers { user: bob }).await {
        Response::Transfers { transfers } => assert!(transfers.is_empty()),
        other => panic!("unexpected response: {other:?}"),
    }
}
