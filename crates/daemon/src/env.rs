// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: GM_STATE_DIR > XDG_STATE_HOME/gridmill >
/// ~/.local/state/gridmill
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("GM_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("gridmill"));
    }
    dirs::home_dir()
        .map(|home| home.join(".local/state/gridmill"))
        .ok_or(LifecycleError::NoStateDir)
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    std::env::var("GM_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Engine tick interval
pub fn tick_interval() -> Duration {
    std::env::var("GM_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(500))
}

/// Sweeper cadence
pub fn sweep_interval() -> Duration {
    std::env::var("GM_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(60))
}

/// Cap on simultaneously in-DRM jobs per user
pub fn max_in_drm() -> Option<usize> {
    std::env::var("GM_MAX_IN_DRM").ok().and_then(|s| s.parse::<usize>().ok())
}

/// Site shared-resource translation table (JSON file)
pub fn translation_file() -> Option<PathBuf> {
    std::env::var("GM_TRANSLATIONS").ok().map(PathBuf::from)
}
