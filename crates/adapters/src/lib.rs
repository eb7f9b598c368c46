// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gm-adapters: DRM adapter contract and implementations

mod drm;
mod local;
mod retry;

pub use drm::{DrmAdapter, DrmError, DrmStatus, DrmTemplate};
pub use local::LocalDrm;
pub use retry::Backoff;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DrmCall, FakeDrm};
