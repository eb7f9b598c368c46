// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Path resolver: symbolic tokens → concrete compute-side strings.
//!
//! Runs just before DRM submission. Resolution is side-effect-free apart
//! from temporary allocation, which is returned as a plan — the engine
//! records the chosen paths in the store before submitting, so a replayed
//! job sees the same concrete paths.

use gm_adapters::DrmTemplate;
use gm_core::{CommandToken, Job, SharedResourcePath, TemporaryId, TransferId, TransferStatus};
use gm_storage::MaterializedState;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Site-configured translation of shared resource paths:
/// `(namespace, uuid) → base directory`.
#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    entries: HashMap<(String, String), PathBuf>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        namespace: impl Into<String>,
        uuid: impl Into<String>,
        base: impl Into<PathBuf>,
    ) {
        self.entries.insert((namespace.into(), uuid.into()), base.into());
    }

    pub fn lookup(&self, namespace: &str, uuid: &str) -> Option<&PathBuf> {
        self.entries.get(&(namespace.to_string(), uuid.to_string()))
    }

    /// Load from a JSON file shaped `{ "namespace": { "uuid": "/base" } }`.
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        #[derive(Deserialize)]
        struct FileShape(HashMap<String, HashMap<String, PathBuf>>);

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::TableUnreadable { path: path.to_path_buf(), reason: e.to_string() }
        })?;
        let FileShape(raw) = serde_json::from_str(&contents).map_err(|e| {
            ResolveError::TableUnreadable { path: path.to_path_buf(), reason: e.to_string() }
        })?;

        let mut table = Self::new();
        for (namespace, uuids) in raw {
            for (uuid, base) in uuids {
                table.entries.insert((namespace.clone(), uuid), base);
            }
        }
        Ok(table)
    }
}

/// Resolution failures. Missing translations are fatal configuration
/// errors; the rest fail the individual job.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("unknown transfer {0}")]
    UnknownTransfer(TransferId),

    #[error("transfer {0} has no compute-side bytes yet")]
    TransferNotReady(TransferId),

    #[error("no translation for shared resource ({namespace}, {uuid})")]
    MissingTranslation { namespace: String, uuid: String },

    #[error("unknown temporary path {0}")]
    UnknownTemporary(TemporaryId),

    #[error("translation table {path} unreadable: {reason}")]
    TableUnreadable { path: PathBuf, reason: String },
}

/// A resolved DRM template plus the temporary paths chosen during
/// resolution (not yet recorded in the store).
#[derive(Debug)]
pub struct Resolved {
    pub template: DrmTemplate,
    pub allocations: Vec<(TemporaryId, PathBuf)>,
}

struct Resolution<'a> {
    state: &'a MaterializedState,
    table: &'a TranslationTable,
    scratch_dir: &'a Path,
    job: &'a Job,
    allocations: HashMap<TemporaryId, PathBuf>,
}

/// Build the DRM template for a job, replacing every symbolic path.
pub fn resolve_job(
    job: &Job,
    state: &MaterializedState,
    table: &TranslationTable,
    scratch_dir: &Path,
) -> Result<Resolved, ResolveError> {
    let mut ctx = Resolution { state, table, scratch_dir, job, allocations: HashMap::new() };

    let command = job
        .command
        .iter()
        .map(|t| ctx.resolve_token(t))
        .collect::<Result<Vec<String>, ResolveError>>()?;

    let working_directory = ctx.resolve_path_opt(&job.working_directory)?;
    let stdin_path = ctx.resolve_path_opt(&job.stdin)?;
    let stdout_path = ctx.resolve_path_opt(&job.stdout_target)?;
    let stderr_path = ctx.resolve_path_opt(&job.stderr_target)?;

    let template = DrmTemplate {
        command,
        name: job.name.clone(),
        working_directory,
        stdin_path,
        stdout_path,
        stderr_path,
        join_stderr: job.join_stderr,
        environment: Vec::new(),
        native_spec: job.native_spec.clone(),
        parallel: job.parallel.clone(),
    };
    let mut allocations: Vec<(TemporaryId, PathBuf)> = ctx.allocations.into_iter().collect();
    allocations.sort_by_key(|(id, _)| *id);
    Ok(Resolved { template, allocations })
}

impl Resolution<'_> {
    fn resolve_path_opt(
        &mut self,
        token: &Option<CommandToken>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        token.as_ref().map(|t| self.resolve_token(t).map(PathBuf::from)).transpose()
    }

    fn resolve_token(&mut self, token: &CommandToken) -> Result<String, ResolveError> {
        match token {
            CommandToken::Literal(s) => Ok(s.clone()),

            CommandToken::Transfer(id) => self.resolve_transfer(id),

            CommandToken::Shared(shared) => self.resolve_shared(shared),

            CommandToken::Temporary(id) => self.resolve_temporary(*id),

            CommandToken::OptionPath { parent, uri } => {
                Ok(format!("{}{}", self.resolve_token(parent)?, uri))
            }

            CommandToken::Pair { transfer, relative } => {
                Ok(format!("{}/{}", self.resolve_transfer(transfer)?, relative))
            }

            CommandToken::Seq(elems) => {
                let resolved = elems
                    .iter()
                    .map(|e| self.resolve_token(e))
                    .collect::<Result<Vec<String>, ResolveError>>()?;
                let quoted: Vec<String> =
                    resolved.into_iter().map(|p| format!("'{p}'")).collect();
                Ok(format!("[{}]", quoted.join(", ")))
            }
        }
    }

    fn resolve_transfer(&self, id: &TransferId) -> Result<String, ResolveError> {
        let transfer = self
            .state
            .transfers
            .get(id)
            .ok_or_else(|| ResolveError::UnknownTransfer(id.clone()))?;
        // A transfer read by the job must already have compute-side bytes
        if transfer.status == TransferStatus::DoesNotExist
            && self.job.referenced_inputs.contains(id)
        {
            return Err(ResolveError::TransferNotReady(id.clone()));
        }
        Ok(transfer.id.as_str().to_string())
    }

    fn resolve_shared(&self, shared: &SharedResourcePath) -> Result<String, ResolveError> {
        let base = self.table.lookup(&shared.namespace, &shared.uuid).ok_or_else(|| {
            ResolveError::MissingTranslation {
                namespace: shared.namespace.clone(),
                uuid: shared.uuid.clone(),
            }
        })?;
        Ok(base.join(&shared.relative_path).display().to_string())
    }

    fn resolve_temporary(&mut self, id: TemporaryId) -> Result<String, ResolveError> {
        let temporary = self
            .state
            .temporaries
            .get(&id)
            .ok_or(ResolveError::UnknownTemporary(id))?;
        if let Some(path) = &temporary.concrete_path {
            return Ok(path.display().to_string());
        }
        if let Some(planned) = self.allocations.get(&id) {
            return Ok(planned.display().to_string());
        }
        // First use: pick a unique scratch path with the declared suffix
        let path = self.scratch_dir.join(format!("{}{}", id.suffix(), temporary.suffix));
        self.allocations.insert(id, path.clone());
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
