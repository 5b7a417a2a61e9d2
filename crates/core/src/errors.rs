// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error codes reported in a substatus's `errors` list (§7).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Environment pre-check: interpreter too old.
    ClPythonTooOld,
    /// Environment pre-check: `sudo timeout 10 id` did not return the expected marker.
    ClSudoCheckFailed,
    /// Environment pre-check: telemetry agent below the required version.
    ClAgentTooOld,
    /// Unexpected exit code from a package manager invocation.
    ClPackageManagerFailure,
    /// Sequence number advanced mid-run; this run was superseded.
    ClNewerOperationSuperseded,
    /// `AutomaticByPlatform` assessment requested but systemd is not the init system.
    ClSystemdNotPresent,
    /// Maintenance window exceeded or malformed.
    SvMaintenanceWindowError,
    /// OS auto-update disable failed, or its config write was refused.
    PatchModeSetFailure,
    /// An Ubuntu Pro ESM package needs an active subscription.
    UaEsmRequired,
    /// Generic operator failure with no more specific code.
    OperationFailed,
    /// Generic error, no further classification.
    Error,
    /// Informational entry, not a failure.
    Info,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClPythonTooOld => "CL_PYTHON_TOO_OLD",
            Self::ClSudoCheckFailed => "CL_SUDO_CHECK_FAILED",
            Self::ClAgentTooOld => "CL_AGENT_TOO_OLD",
            Self::ClPackageManagerFailure => "CL_PACKAGE_MANAGER_FAILURE",
            Self::ClNewerOperationSuperseded => "CL_NEWER_OPERATION_SUPERSEDED",
            Self::ClSystemdNotPresent => "CL_SYSTEMD_NOT_PRESENT",
            Self::SvMaintenanceWindowError => "SV_MAINTENANCE_WINDOW_ERROR",
            Self::PatchModeSetFailure => "PATCH_MODE_SET_FAILURE",
            Self::UaEsmRequired => "UA_ESM_REQUIRED",
            Self::OperationFailed => "OPERATION_FAILED",
            Self::Error => "ERROR",
            Self::Info => "INFO",
        }
    }

    /// Top-level severity embedded alongside the code in `errors.code`: 0
    /// for success/informational, 1 for everything else.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Info => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
