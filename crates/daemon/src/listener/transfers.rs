// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Transfer request handlers.

use super::{engine_error, ListenCtx};
use gm_core::{Clock, ErrorKind};
use gm_wire::{Request, Response, TransferEntry};

pub(crate) async fn handle<C: Clock>(ctx: &ListenCtx<C>, request: Request) -> Response {
    match request {
        Request::RegisterTransfer { user, client_path, client_paths, direction, disposal_hours } => {
            match ctx
                .coordinator
                .register(
                    user,
                    client_path,
                    client_paths,
                    direction,
                    disposal_hours,
                    ctx.engine.now(),
                    ctx.engine.epoch_ms(),
                )
                .await
            {
                Ok(server_path) => Response::TransferRegistered { server_path },
                Err(e) => engine_error(e),
            }
        }

        Request::TransferWrite { user, server_path, bytes, eof } => {
            match ctx.coordinator.write_chunk(user, &server_path, &bytes, eof).await {
                Ok(()) => Response::Ok,
                Err(e) => engine_error(e),
            }
        }

        Request::TransferRead { user, server_path, offset, max_len } => {
            match ctx.coordinator.read_chunk(user, &server_path, offset, max_len).await {
                Ok(bytes) => Response::Bytes { bytes },
                Err(e) => engine_error(e),
            }
        }

        Request::CancelTransfer { user, server_path } => {
            match ctx.coordinator.cancel(user, &server_path, ctx.engine.now()) {
                Ok(()) => Response::Ok,
                Err(e) => engine_error(e),
            }
        }

        Request::ListTransfers { user } => Response::Transfers {
            transfers: ctx.store.list_transfers(user).iter().map(TransferEntry::from).collect(),
        },

        Request::TransferInfo { user, server_path } => {
            match ctx.coordinator.info(user, &server_path) {
                Ok(transfer) => Response::TransferInfo { info: TransferEntry::from(&transfer) },
                Err(e) => engine_error(e),
            }
        }

        other => Response::error(ErrorKind::Internal, format!("misrouted request: {other:?}")),
    }
}
