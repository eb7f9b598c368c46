// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Job and workflow request handlers.

use super::{engine_error, store_error, ListenCtx};
use crate::session::StreamKind;
use gm_core::{Clock, ErrorKind, Job, JobId, UserId};
use gm_wire::{JobEntry, Request, Response, WorkflowEntry};

pub(crate) async fn handle<C: Clock>(ctx: &ListenCtx<C>, request: Request) -> Response {
    match request {
        Request::SubmitJob { user, spec } => {
            match ctx.store.submit_job(user, spec, ctx.engine.now(), ctx.engine.epoch_ms()) {
                Ok(id) => Response::JobSubmitted { id },
                Err(e) => store_error(e),
            }
        }

        Request::SubmitWorkflow { user, spec } => {
            match ctx.store.submit_workflow(user, spec, ctx.engine.now(), ctx.engine.epoch_ms())
            {
                Ok(id) => Response::WorkflowSubmitted { id },
                Err(e) => store_error(e),
            }
        }

        Request::ListJobs { user } => Response::Jobs {
            jobs: ctx.store.list_jobs(user).iter().map(JobEntry::from).collect(),
        },

        Request::ListWorkflows { user } => Response::Workflows {
            workflows: ctx.store.list_workflows(user).iter().map(WorkflowEntry::from).collect(),
        },

        Request::JobStatus { user, id } => match ctx.store.job(user, id) {
            Ok(job) => Response::JobStatus { status: job.status },
            Err(e) => store_error(e),
        },

        Request::WorkflowStatus { user, id } => match ctx.store.workflow(user, id) {
            Ok(wf) => Response::WorkflowStatus { status: wf.status },
            Err(e) => store_error(e),
        },

        Request::ExitInfo { user, id } => match ctx.store.job(user, id) {
            Ok(job) => Response::ExitInfo { exit: job.exit.as_ref().map(Into::into) },
            Err(e) => store_error(e),
        },

        Request::StdoutReadLine { user, id } => {
            read_stdio_line(ctx, user, id, StreamKind::Stdout)
        }

        // Same ownership gate as stdout; the streams differ only in path
        Request::StderrReadLine { user, id } => {
            read_stdio_line(ctx, user, id, StreamKind::Stderr)
        }

        Request::Wait { user, ids, timeout_secs } => {
            match ctx.engine.wait(user, &ids, timeout_secs).await {
                Ok(all_terminal) => Response::WaitDone { all_terminal },
                Err(e) => engine_error(e),
            }
        }

        Request::Stop { user, id } => match ctx.engine.stop(user, id).await {
            Ok(()) => Response::Ok,
            Err(e) => engine_error(e),
        },

        Request::Restart { user, id } => match ctx.engine.restart(user, id).await {
            Ok(()) => Response::Ok,
            Err(e) => engine_error(e),
        },

        Request::Kill { user, id } => match ctx.engine.kill(user, id).await {
            Ok(()) => Response::Ok,
            Err(e) => engine_error(e),
        },

        Request::Dispose { user, id } => match ctx.engine.dispose(user, id).await {
            Ok(()) => {
                ctx.sessions.forget_job(user, id);
                Response::Ok
            }
            Err(e) => engine_error(e),
        },

        Request::DisposeWorkflow { user, id } => {
            match ctx.engine.dispose_workflow(user, id).await {
                Ok(()) => Response::Ok,
                Err(e) => engine_error(e),
            }
        }

        other => Response::error(ErrorKind::Internal, format!("misrouted request: {other:?}")),
    }
}

/// Stdio reads go through the per-session incremental reader — never a
/// direct client-side open, which breaks on a remote file system.
fn read_stdio_line<C: Clock>(
    ctx: &ListenCtx<C>,
    user: UserId,
    id: JobId,
    kind: StreamKind,
) -> Response {
    let job = match ctx.store.job(user, id) {
        Ok(job) => job,
        Err(e) => return store_error(e),
    };
    let path = match stream_path(&job, kind) {
        Some(path) => path,
        None => return Response::Line { line: None },
    };
    match ctx.sessions.read_line(user, id, kind, &path) {
        Ok(line) => Response::Line { line },
        Err(e) => Response::error(ErrorKind::Internal, format!("stdio read failed: {e}")),
    }
}

fn stream_path(job: &Job, kind: StreamKind) -> Option<std::path::PathBuf> {
    match kind {
        StreamKind::Stdout => job.stdout_path.clone(),
        // Joined stderr has no file of its own
        StreamKind::Stderr => job.stderr_path.clone(),
    }
}
