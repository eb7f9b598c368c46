// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! File-transfer coordinator.
//!
//! Guarantees input files exist on the compute side before a dependent job
//! is submitted, makes outputs retrievable afterwards, and keeps server
//! paths alive while live jobs reference them. Byte movement is explicit
//! and offset-based: no file descriptor is held across RPC boundaries.

use crate::error::EngineError;
use chrono::{DateTime, Duration, Utc};
use gm_core::{Transfer, TransferDirection, TransferId, TransferStatus, UserId};
use gm_storage::Store;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

/// Largest chunk a single read call returns.
pub const MAX_CHUNK: usize = 64 * 1024;

/// Coordinates client-side paths with service-owned server paths.
#[derive(Clone)]
pub struct TransferCoordinator {
    store: Arc<Store>,
    transfer_dir: PathBuf,
}

impl TransferCoordinator {
    pub fn new(store: Arc<Store>, transfer_dir: PathBuf) -> Self {
        Self { store, transfer_dir }
    }

    /// Allocate a unique server path for `client_path` and record the
    /// transfer. With `client_paths` set (multi-file formats), the server
    /// path is a directory and the associated files live inside it.
    #[allow(clippy::too_many_arguments)]
    pub async fn register(
        &self,
        user: UserId,
        client_path: String,
        client_paths: Option<Vec<String>>,
        direction: TransferDirection,
        disposal_hours: u32,
        now: DateTime<Utc>,
        now_ms: u64,
    ) -> Result<TransferId, EngineError> {
        if client_path.is_empty() {
            return Err(EngineError::InvalidArgument("client path must not be empty".into()));
        }
        let id = TransferId::new(self.allocate_server_path(&client_path));
        if client_paths.is_some() {
            tokio::fs::create_dir_all(id.as_str()).await?;
        }

        let transfer = Transfer {
            id: id.clone(),
            user_id: user,
            client_path,
            client_paths,
            direction,
            status: Transfer::initial_status(direction),
            expires_at: now + Duration::hours(i64::from(disposal_hours)),
            registered_at_ms: now_ms,
            refs: Default::default(),
        };
        self.store.register_transfer(transfer)?;
        debug!(server_path = %id, "registered transfer");
        Ok(id)
    }

    /// Append a chunk to the server-side file. The first chunk moves the
    /// transfer to `Transferring`; `eof` closes it at `OnCompute`.
    pub async fn write_chunk(
        &self,
        user: UserId,
        id: &TransferId,
        bytes: &[u8],
        eof: bool,
    ) -> Result<(), EngineError> {
        let transfer = self.store.transfer(user, id)?;
        match transfer.status {
            TransferStatus::OnClient | TransferStatus::Transferring => {}
            other => {
                return Err(EngineError::TransferConflict(format!(
                    "cannot write a transfer in state {other}"
                )));
            }
        }

        if !bytes.is_empty() {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(id.as_str())
                .await?;
            file.write_all(bytes).await?;
            file.flush().await?;
        }

        if eof {
            self.store.set_transfer_status(id, TransferStatus::OnCompute)?;
        } else if transfer.status == TransferStatus::OnClient {
            self.store.set_transfer_status(id, TransferStatus::Transferring)?;
        }
        Ok(())
    }

    /// Read up to `MAX_CHUNK` bytes starting at `offset`. An empty result
    /// means end of file.
    pub async fn read_chunk(
        &self,
        user: UserId,
        id: &TransferId,
        offset: u64,
        max_len: usize,
    ) -> Result<Vec<u8>, EngineError> {
        let transfer = self.store.transfer(user, id)?;
        if transfer.status == TransferStatus::DoesNotExist {
            return Err(EngineError::TransferConflict(
                "transfer has no compute-side bytes yet".into(),
            ));
        }

        let mut file = tokio::fs::File::open(id.as_str()).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; max_len.min(MAX_CHUNK)];
        let mut filled = 0usize;
        loop {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == buf.len() {
                break;
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Mark the transfer for prompt disposal: expiration becomes `now`.
    /// While live jobs still reference it, the bytes persist until the
    /// last reference is disposed.
    pub fn cancel(
        &self,
        user: UserId,
        id: &TransferId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        // Gate before mutating
        self.store.transfer(user, id)?;
        self.store.set_transfer_expiration(id, now)?;
        Ok(())
    }

    /// `(server_path, client_path, expiration)` plus current status.
    pub fn info(&self, user: UserId, id: &TransferId) -> Result<Transfer, EngineError> {
        Ok(self.store.transfer(user, id)?)
    }

    fn allocate_server_path(&self, client_path: &str) -> String {
        let base = Path::new(client_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "transfer".to_string());
        let unique = Uuid::new_v4().simple().to_string();
        self.transfer_dir.join(format!("{}-{}", &unique[..12], base)).display().to_string()
    }
}

#[cfg(test)]
#[path = "transfers_tests.rs"]
mod tests;
