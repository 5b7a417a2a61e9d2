// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment pre-checks run once at the very start of every invocation,
//! before the Lifecycle Manager is consulted: sudo invocability, minimum
//! runtime compatibility, and telemetry agent compatibility. A failure in
//! any of these is fatal and reported against every substatus.

use lpe_adapters::subprocess::{run_command, SUDO_CHECK_TIMEOUT};
use lpe_core::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("runtime requirements not met")]
    RuntimeTooOld,
    #[error("sudo is not invokable: {0}")]
    SudoCheckFailed(String),
    #[error("telemetry agent is not compatible")]
    AgentTooOld,
}

impl PreflightError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::RuntimeTooOld => ErrorCode::ClPythonTooOld,
            Self::SudoCheckFailed(_) => ErrorCode::ClSudoCheckFailed,
            Self::AgentTooOld => ErrorCode::ClAgentTooOld,
        }
    }
}

/// Minimum supported Linux kernel major version; anything older than this
/// predates the cgroup/systemd surface the rest of the engine assumes.
const MINIMUM_KERNEL_MAJOR: u32 = 3;

/// Runs all three pre-checks in order, returning the first failure. Callers
/// should treat any `Err` as immediately fatal: add the matching error code
/// to every substatus and exit with a critical-error exit code.
pub async fn run_preflight_checks(telemetry_agent_version: Option<&str>) -> Result<(), PreflightError> {
    check_runtime_requirements()?;
    check_sudo_invokable().await?;
    check_telemetry_agent_compatibility(telemetry_agent_version)?;
    Ok(())
}

fn check_runtime_requirements() -> Result<(), PreflightError> {
    let release = kernel_release().ok_or(PreflightError::RuntimeTooOld)?;
    let major = release
        .split('.')
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(PreflightError::RuntimeTooOld)?;
    if major < MINIMUM_KERNEL_MAJOR {
        return Err(PreflightError::RuntimeTooOld);
    }
    Ok(())
}

fn kernel_release() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|s| s.trim().to_string())
}

async fn check_sudo_invokable() -> Result<(), PreflightError> {
    let result = run_command("sudo", &["timeout", "10", "id", "-u"], SUDO_CHECK_TIMEOUT)
        .await
        .map_err(PreflightError::SudoCheckFailed)?;
    if !result.succeeded_with_code(0) {
        return Err(PreflightError::SudoCheckFailed(result.stderr));
    }
    Ok(())
}

/// The telemetry agent's wire format is versioned; anything below the
/// minimum this binary was built against cannot be trusted to consume the
/// events correctly.
const MINIMUM_AGENT_VERSION: &str = "2.0";

fn check_telemetry_agent_compatibility(version: Option<&str>) -> Result<(), PreflightError> {
    let Some(version) = version else {
        return Ok(());
    };
    let parse_major = |s: &str| s.split('.').next().and_then(|p| p.parse::<u32>().ok());
    match (parse_major(version), parse_major(MINIMUM_AGENT_VERSION)) {
        (Some(actual), Some(minimum)) if actual < minimum => Err(PreflightError::AgentTooOld),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "precheck_tests.rs"]
mod tests;
