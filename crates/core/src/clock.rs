// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Time sources.
//!
//! The service needs two readings: epoch milliseconds for record stamps
//! (WAL entries, submission times) and a wall-clock [`DateTime<Utc>`] for
//! expiration arithmetic. Both derive from a single `epoch_ms` so fake
//! time stays coherent in tests — advancing the fake moves expirations
//! and timestamps together.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time.
pub trait Clock: Clone + Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// Wall-clock reading used for expiration dates.
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.epoch_ms() as i64).unwrap_or_else(Utc::now)
    }
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for tests.
///
/// Starts at the real current time so expiration arithmetic behaves as
/// in production; clones share the underlying counter.
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { epoch_ms: Arc::new(AtomicU64::new(SystemClock.epoch_ms())) }
    }

    /// Move time forward by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.epoch_ms.fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Jump to an absolute epoch-milliseconds value.
    pub fn set_epoch_ms(&self, ms: u64) {
        self.epoch_ms.store(ms, Ordering::Relaxed);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
