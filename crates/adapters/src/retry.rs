// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Bounded exponential backoff for transient DRM faults.

use std::time::Duration;

/// Doubling backoff with an attempt bound and a delay cap.
///
/// ```ignore
/// let mut backoff = Backoff::new(5, Duration::from_millis(100));
/// while let Some(delay) = backoff.next_delay() {
///     tokio::time::sleep(delay).await;
///     // retry …
/// }
/// // attempts exhausted
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self { attempt: 0, max_attempts, base, cap: Duration::from_secs(60) }
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Delay before the next retry, or `None` when attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self
            .base
            .checked_mul(1u32 << self.attempt.min(16))
            .unwrap_or(self.cap)
            .min(self.cap);
        self.attempt += 1;
        Some(delay)
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
