// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Maintenance Window (I): time-budget arithmetic for Installation's
//! per-batch gating (§4.7, P8).

use chrono::DateTime;
use lpe_core::{Iso8601Duration, RebootSetting};
use thiserror::Error;

/// Expected install time per package batch, in minutes; scaled by batch
/// size to form the cutoff `IsPackageInstallTimeAvailable` checks against.
pub const PACKAGE_INSTALL_EXPECTED_MAX_TIME_IN_MINUTES: i64 = 5;
/// Added to the cutoff whenever a reboot may occur (`rebootSetting != Never`).
pub const REBOOT_BUFFER_IN_MINUTES: i64 = 15;
/// Minimum minutes that must remain in the window before a reboot is
/// allowed to start (SPEC_FULL.md §4, `REBOOT_WAIT_TIMEOUT_IN_MINUTES`).
pub const REBOOT_WAIT_TIMEOUT_IN_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum MaintenanceWindowError {
    #[error("invalid start time {0:?}: {1}")]
    InvalidStartTime(String, chrono::ParseError),
}

/// Given a start time, a maximum duration, and a reboot setting, answers
/// how much time remains and whether a given package batch still fits.
pub struct MaintenanceWindow {
    start_epoch_secs: i64,
    maximum_duration: Iso8601Duration,
    reboot_setting: RebootSetting,
}

impl MaintenanceWindow {
    pub fn new(start_epoch_secs: i64, maximum_duration: Iso8601Duration, reboot_setting: RebootSetting) -> Self {
        Self {
            start_epoch_secs,
            maximum_duration,
            reboot_setting,
        }
    }

    /// Parses `start_time` (an ISO-8601 UTC timestamp, as supplied in
    /// `-configSettings`) into a window anchored at that instant.
    pub fn from_iso_start(
        start_time: &str,
        maximum_duration: Iso8601Duration,
        reboot_setting: RebootSetting,
    ) -> Result<Self, MaintenanceWindowError> {
        let parsed = DateTime::parse_from_rfc3339(start_time)
            .map_err(|e| MaintenanceWindowError::InvalidStartTime(start_time.to_string(), e))?;
        Ok(Self::new(parsed.timestamp(), maximum_duration, reboot_setting))
    }

    /// Minutes remaining in the window as of `now`, never negative (P8).
    pub fn remaining_minutes(&self, now_epoch_secs: i64) -> i64 {
        let elapsed_secs = (now_epoch_secs - self.start_epoch_secs).max(0);
        let total_secs = self.maximum_duration.seconds().max(0);
        ((total_secs - elapsed_secs) / 60).max(0)
    }

    /// Percentage of the window consumed as of `now`, clamped to [0, 100].
    pub fn used_percent(&self, now_epoch_secs: i64) -> i64 {
        let total_secs = self.maximum_duration.seconds();
        if total_secs <= 0 {
            return 100;
        }
        let elapsed_secs = (now_epoch_secs - self.start_epoch_secs).max(0);
        ((elapsed_secs * 100) / total_secs).clamp(0, 100)
    }

    /// Whether a batch of `batch_size` packages still has time to install
    /// given `remaining_minutes` left in the window (§4.7).
    pub fn is_package_install_time_available(&self, remaining_minutes: i64, batch_size: usize) -> bool {
        let mut cutoff = PACKAGE_INSTALL_EXPECTED_MAX_TIME_IN_MINUTES * batch_size as i64;
        if self.reboot_setting != RebootSetting::Never {
            cutoff += REBOOT_BUFFER_IN_MINUTES;
        }
        remaining_minutes > cutoff
    }

    /// The Installation/Reboot Manager handoff contract point (§4.2): the
    /// core owns deciding whether a reboot may start now, not whether one
    /// actually executes (reboot execution itself is out of core scope).
    /// `reboot_pending` is the package manager's `IsRebootPending` probe.
    /// `Never` never starts a reboot; `Always` starts one whenever time
    /// allows regardless of `reboot_pending`; `IfRequired` additionally
    /// requires `reboot_pending`.
    pub fn start_if_required_and_time_available(&self, remaining_minutes: i64, reboot_pending: bool) -> bool {
        let required = match self.reboot_setting {
            RebootSetting::Never => return false,
            RebootSetting::Always => true,
            RebootSetting::IfRequired => reboot_pending,
        };
        required && remaining_minutes > REBOOT_WAIT_TIMEOUT_IN_MINUTES
    }
}

#[cfg(test)]
#[path = "maintenance_window_tests.rs"]
mod tests;
