// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Engine error type.

use gm_core::ErrorKind;
use gm_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the engine, coordinator, and sweeper.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transfer conflict: {0}")]
    TransferConflict(String),

    #[error("DRM unavailable: {0}")]
    DrmUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Wire-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Store(e) => e.kind(),
            EngineError::Configuration(_) => ErrorKind::ConfigurationError,
            EngineError::TransferConflict(_) => ErrorKind::TransferConflict,
            EngineError::DrmUnavailable(_) => ErrorKind::DrmUnavailable,
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::Io(_) => ErrorKind::Internal,
        }
    }
}
