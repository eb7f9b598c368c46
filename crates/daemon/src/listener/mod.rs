// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Listener task for handling socket I/O.
//!
//! The listener runs in a spawned task, accepting connections and
//! handling each on its own task without blocking the engine loop. One
//! framed request per connection, one framed response back.

mod jobs;
mod transfers;

use std::sync::Arc;

use crate::env::ipc_timeout;
use crate::session::SessionRegistry;
use gm_core::Clock;
use gm_engine::{Engine, EngineError, TransferCoordinator};
use gm_storage::{Store, StoreError};
use gm_wire::{read_request, write_response, ProtocolError, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Shared daemon context for all request handlers.
pub struct ListenCtx<C: Clock> {
    pub store: Arc<Store>,
    pub engine: Arc<Engine<C>>,
    pub coordinator: TransferCoordinator,
    pub sessions: SessionRegistry,
    pub shutdown: CancellationToken,
}

/// Listener task accepting Unix-socket connections.
pub struct Listener<C: Clock> {
    unix: UnixListener,
    ctx: Arc<ListenCtx<C>>,
}

impl<C: Clock + 'static> Listener<C> {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { unix, ctx }
    }

    /// Accept connections until shutdown, spawning a task per connection.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.ctx.shutdown.cancelled() => break,
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) = handle_connection(reader, writer, &ctx).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("accept error: {e}"),
                },
            }
        }
        debug!("listener stopped");
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => warn!("connection timeout"),
        other => error!("connection error: {other}"),
    }
}

/// Handle a single client connection: one request, one response.
async fn handle_connection<C, R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx<C>,
) -> Result<(), ProtocolError>
where
    C: Clock,
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let request = read_request(&mut reader, ipc_timeout()).await?;
    let response = handle_request(ctx, request).await;
    write_response(&mut writer, &response, ipc_timeout()).await
}

/// Dispatch one request to its handler.
pub async fn handle_request<C: Clock>(ctx: &ListenCtx<C>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::RegisterUser { login } => {
            match ctx.store.register_user(&login, ctx.engine.epoch_ms()) {
                Ok(user) => Response::Registered { user },
                Err(e) => store_error(e),
            }
        }

        Request::Shutdown => {
            ctx.shutdown.cancel();
            Response::Ok
        }

        Request::SubmitJob { .. }
        | Request::SubmitWorkflow { .. }
        | Request::ListJobs { .. }
        | Request::ListWorkflows { .. }
        | Request::JobStatus { .. }
        | Request::WorkflowStatus { .. }
        | Request::ExitInfo { .. }
        | Request::StdoutReadLine { .. }
        | Request::StderrReadLine { .. }
        | Request::Wait { .. }
        | Request::Stop { .. }
        | Request::Restart { .. }
        | Request::Kill { .. }
        | Request::Dispose { .. }
        | Request::DisposeWorkflow { .. } => jobs::handle(ctx, request).await,

        Request::RegisterTransfer { .. }
        | Request::TransferWrite { .. }
        | Request::TransferRead { .. }
        | Request::CancelTransfer { .. }
        | Request::ListTransfers { .. }
        | Request::TransferInfo { .. } => transfers::handle(ctx, request).await,
    }
}

pub(crate) fn store_error(e: StoreError) -> Response {
    Response::error(e.kind(), e.to_string())
}

pub(crate) fn engine_error(e: EngineError) -> Response {
    Response::error(e.kind(), e.to_string())
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
