// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Workflow scenarios: chains, diamonds, and group fan-in.

use super::support::Harness;
use gm_core::{
    ExitInfo, FailureCause, GroupSpec, JobSpec, JobStatus, UserId, WorkflowElement, WorkflowId,
    WorkflowSpec, WorkflowStatus,
};
use gm_wire::{Request, Response};

fn no_op() -> JobSpec {
    JobSpec::from_literals(["true"])
}

async fn submit_workflow(h: &Harness, user: UserId, spec: WorkflowSpec) -> WorkflowId {
    match h.request(Request::SubmitWorkflow { user, spec }).await {
        Response::WorkflowSubmitted { id } => id,
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn linear_chain_completes_in_order() {
    let h = Harness::local();
    let user = h.register("alice").await;
    let wf_id = submit_workflow(
        &h,
        user,
        WorkflowSpec::new(vec![no_op(), no_op(), no_op()]).dependencies(vec![
            (WorkflowElement::Job(0), WorkflowElement::Job(1)),
            (WorkflowElement::Job(1), WorkflowElement::Job(2)),
        ]),
    )
    .await;

    let workflow = h.ctx.store.workflow(user, wf_id).unwrap();
    let store = std::sync::Arc::clone(&h.ctx.store);
    let id = wf_id;
    h.run_until(move || {
        store
            .with_state(|s| s.workflows.get(&id).map(|w| w.status))
            .map(|s| s == WorkflowStatus::Done)
            .unwrap_or(false)
    })
    .await;

    // Submission respected the chain: A before B before C
    let jobs: Vec<_> = workflow
        .job_ids
        .iter()
        .map(|id| h.ctx.store.job(user, *id).unwrap())
        .collect();
    assert!(jobs.iter().all(|j| j.status == JobStatus::Done));
    let submitted: Vec<u64> = jobs.iter().map(|j| j.submitted_at_ms.unwrap()).collect();
    assert!(submitted[0] <= submitted[1]);
    assert!(submitted[1] <= submitted[2]);
}

#[tokio::test]
async fn chain_never_submits_ahead_of_its_predecessor() {
    let h = Harness::fake();
    let drm = h.fake_drm.clone().unwrap();
    let user = h.register("alice").await;
    let wf_id = submit_workflow(
        &h,
        user,
        WorkflowSpec::new(vec![no_op(), no_op()])
            .dependencies(vec![(WorkflowElement::Job(0), WorkflowElement::Job(1))]),
    )
    .await;
    let workflow = h.ctx.store.workflow(user, wf_id).unwrap();
    let (a, b) = (workflow.job_ids[0], workflow.job_ids[1]);

    h.engine.tick().await.unwrap();
    assert_eq!(h.status(user, a).await, JobStatus::QueuedActive);
    assert_eq!(h.status(user, b).await, JobStatus::Pending);
    assert_eq!(drm.submitted_count(), 1);

    drm.complete(&h.drm_id(user, a), ExitInfo::finished(0));
    h.run_until_status(b, JobStatus::QueuedActive).await;
    assert_eq!(drm.submitted_count(), 2);
}

#[tokio::test]
async fn diamond_with_failing_branch() {
    let h = Harness::fake();
    let drm = h.fake_drm.clone().unwrap();
    let user = h.register("alice").await;
    // A → B, A → C, B → D, C → D
    let wf_id = submit_workflow(
        &h,
        user,
        WorkflowSpec::new(vec![no_op(), no_op(), no_op(), no_op()]).dependencies(vec![
            (WorkflowElement::Job(0), WorkflowElement::Job(1)),
            (WorkflowElement::Job(0), WorkflowElement::Job(2)),
            (WorkflowElement::Job(1), WorkflowElement::Job(3)),
            (WorkflowElement::Job(2), WorkflowElement::Job(3)),
        ]),
    )
    .await;
    let workflow = h.ctx.store.workflow(user, wf_id).unwrap();
    let (a, b, c, d) =
        (workflow.job_ids[0], workflow.job_ids[1], workflow.job_ids[2], workflow.job_ids[3]);

    h.engine.tick().await.unwrap();
    drm.complete(&h.drm_id(user, a), ExitInfo::finished(0));
    h.run_until_status(b, JobStatus::QueuedActive).await;

    drm.complete(&h.drm_id(user, b), ExitInfo::finished(1));
    drm.complete(&h.drm_id(user, c), ExitInfo::finished(0));
    h.run_until_status(d, JobStatus::Failed).await;

    assert_eq!(h.status(user, a).await, JobStatus::Done);
    assert_eq!(h.status(user, b).await, JobStatus::Failed);
    assert_eq!(h.status(user, c).await, JobStatus::Done);

    let d_job = h.ctx.store.job(user, d).unwrap();
    assert_eq!(d_job.failure_cause, Some(FailureCause::UpstreamFailed));
    assert!(d_job.drm_id.is_none(), "D must never get a DRM id");
    assert_eq!(drm.submitted_count(), 3);
}

#[tokio::test]
async fn group_fan_in_inserts_barriers() {
    let h = Harness::fake();
    let user = h.register("alice").await;
    // Group G = {X, Y, Z}, dependency G → W
    let wf_id = submit_workflow(
        &h,
        user,
        WorkflowSpec::new(vec![no_op(), no_op(), no_op(), no_op()])
            .groups(vec![GroupSpec::new(
                "G",
                vec![
                    WorkflowElement::Job(0),
                    WorkflowElement::Job(1),
                    WorkflowElement::Job(2),
                ],
            )])
            .dependencies(vec![(WorkflowElement::Group(0), WorkflowElement::Job(3))]),
    )
    .await;
    let workflow = h.ctx.store.workflow(user, wf_id).unwrap();

    let jobs: Vec<_> = workflow
        .job_ids
        .iter()
        .map(|id| h.ctx.store.job(user, *id).unwrap())
        .collect();
    let g_input = jobs.iter().find(|j| j.name == "G_input").expect("input barrier");
    let g_output = jobs.iter().find(|j| j.name == "G_output").expect("output barrier");
    assert!(g_input.barrier && g_output.barrier);

    // W depends only on G_output
    let w = workflow.job_ids[3];
    let preds: Vec<_> = workflow.predecessors_of(w).collect();
    assert_eq!(preds, vec![g_output.id]);

    // X, Y, Z each depend on G_input and feed G_output
    for member in &workflow.job_ids[0..3] {
        let preds: Vec<_> = workflow.predecessors_of(*member).collect();
        assert_eq!(preds, vec![g_input.id]);
        assert!(workflow.dependencies.contains(&(*member, g_output.id)));
    }
}

#[tokio::test]
async fn barriers_are_transparent_to_real_job_outcomes() {
    let h = Harness::fake();
    let drm = h.fake_drm.clone().unwrap();
    let user = h.register("alice").await;
    // Group G = {X, Y}, dependency G → W
    let wf_id = submit_workflow(
        &h,
        user,
        WorkflowSpec::new(vec![no_op(), no_op(), no_op()])
            .groups(vec![GroupSpec::new(
                "G",
                vec![WorkflowElement::Job(0), WorkflowElement::Job(1)],
            )])
            .dependencies(vec![(WorkflowElement::Group(0), WorkflowElement::Job(2))]),
    )
    .await;
    let workflow = h.ctx.store.workflow(user, wf_id).unwrap();
    let (x, y, w) = (workflow.job_ids[0], workflow.job_ids[1], workflow.job_ids[2]);

    h.engine.tick().await.unwrap();
    drm.complete(&h.drm_id(user, x), ExitInfo::finished(0));
    drm.complete(&h.drm_id(user, y), ExitInfo::finished(0));
    h.run_until_status(w, JobStatus::QueuedActive).await;
    drm.complete(&h.drm_id(user, w), ExitInfo::finished(0));

    let store = std::sync::Arc::clone(&h.ctx.store);
    h.run_until(move || {
        store
            .with_state(|s| s.workflows.get(&wf_id).map(|w| w.status))
            .map(|s| s == WorkflowStatus::Done)
            .unwrap_or(false)
    })
    .await;

    // Only the three real jobs were submitted; the hubs settled internally
    assert_eq!(drm.submitted_count(), 3);
    for id in &workflow.job_ids {
        assert_eq!(h.status(user, *id).await, JobStatus::Done);
    }
}

#[tokio::test]
async fn workflow_round_trips_through_serde() {
    let spec = WorkflowSpec::new(vec![no_op(), no_op()])
        .name("round-trip")
        .groups(vec![GroupSpec::new("G", vec![WorkflowElement::Job(0)])])
        .dependencies(vec![(WorkflowElement::Group(0), WorkflowElement::Job(1))]);

    let json = serde_json::to_string(&spec).unwrap();
    let parsed: WorkflowSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, spec);
}
