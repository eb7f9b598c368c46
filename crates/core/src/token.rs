// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Symbolic path references and the command token variant.
//!
//! A job's command is a sequence of tokens. Literal tokens pass through to
//! the DRM untouched; the symbolic kinds are replaced by concrete
//! compute-side paths at submission time by the resolver.

use serde::{Deserialize, Serialize};

crate::entity_id! {
    /// Unique identifier for a lazily-allocated temporary path.
    pub struct TemporaryId("tmp-");
}

/// Identifier of a transfer: the server-side path allocated at registration.
///
/// The server path is the transfer's primary key everywhere — in the store,
/// on the wire, and inside command tokens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub String);

impl TransferId {
    pub fn new(server_path: impl Into<String>) -> Self {
        Self(server_path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Symbolic path resolved through the site translation table.
///
/// `(namespace, uuid)` select a configured base directory; `relative_path`
/// is appended to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedResourcePath {
    pub namespace: String,
    pub uuid: String,
    pub relative_path: String,
}

impl SharedResourcePath {
    pub fn new(
        namespace: impl Into<String>,
        uuid: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            uuid: uuid.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// One element of a job command, stdin, stdio target, or working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandToken {
    /// Plain string, passed through unchanged
    Literal(String),
    /// Registered transfer; resolves to its server-side path
    Transfer(TransferId),
    /// Site shared resource; resolves via the translation table
    Shared(SharedResourcePath),
    /// Lazily-allocated scratch path, stable across jobs of a workflow
    Temporary(TemporaryId),
    /// `resolve(parent) + uri` (e.g. format options appended to a path)
    OptionPath { parent: Box<CommandToken>, uri: String },
    /// File inside a transferred directory: `dir(transfer) + "/" + relative`
    Pair { transfer: TransferId, relative: String },
    /// Resolved element-wise and emitted as `['p1', 'p2', …]`
    Seq(Vec<CommandToken>),
}

impl CommandToken {
    pub fn literal(s: impl Into<String>) -> Self {
        CommandToken::Literal(s.into())
    }

    /// Collect every transfer referenced by this token, recursively.
    pub fn collect_transfers(&self, out: &mut Vec<TransferId>) {
        match self {
            CommandToken::Literal(_) | CommandToken::Shared(_) | CommandToken::Temporary(_) => {}
            CommandToken::Transfer(id) => out.push(id.clone()),
            CommandToken::Pair { transfer, .. } => out.push(transfer.clone()),
            CommandToken::OptionPath { parent, .. } => parent.collect_transfers(out),
            CommandToken::Seq(elems) => {
                for e in elems {
                    e.collect_transfers(out);
                }
            }
        }
    }

    /// Collect every temporary referenced by this token, recursively.
    pub fn collect_temporaries(&self, out: &mut Vec<TemporaryId>) {
        match self {
            CommandToken::Literal(_) | CommandToken::Shared(_) => {}
            CommandToken::Transfer(_) | CommandToken::Pair { .. } => {}
            CommandToken::Temporary(id) => out.push(*id),
            CommandToken::OptionPath { parent, .. } => parent.collect_temporaries(out),
            CommandToken::Seq(elems) => {
                for e in elems {
                    e.collect_temporaries(out);
                }
            }
        }
    }
}

impl From<&str> for CommandToken {
    fn from(s: &str) -> Self {
        CommandToken::Literal(s.to_string())
    }
}

impl From<String> for CommandToken {
    fn from(s: String) -> Self {
        CommandToken::Literal(s)
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
