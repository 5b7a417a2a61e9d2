// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.

use std::time::{SystemTime, UNIX_EPOCH};

/// A clock that provides the current wall-clock time.
///
/// The maintenance window and auto-assessment eligibility gate both do
/// arithmetic on "now" relative to a persisted timestamp; routing every
/// such read through this trait keeps those calculations deterministic
/// in tests.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// Fake clock for tests with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    current: std::sync::Arc<parking_lot::Mutex<i64>>,
}

impl FakeClock {
    pub fn new(epoch_secs: i64) -> Self {
        Self {
            current: std::sync::Arc::new(parking_lot::Mutex::new(epoch_secs)),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.current.lock() += secs;
    }

    pub fn set(&self, epoch_secs: i64) {
        *self.current.lock() = epoch_secs;
    }
}

impl Clock for FakeClock {
    fn now_epoch_secs(&self) -> i64 {
        *self.current.lock()
    }
}
