// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers shared by every package-manager adapter and
//! the systemd unit manager.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Timeout for the one-time sudo-invokable pre-check (§5).
pub const SUDO_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for package-manager and `systemctl` invocations.
pub const PACKAGE_MANAGER_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Run a subprocess command with a timeout, converting both I/O failure and
/// timeout expiration into a descriptive error message. The child is killed
/// on drop if the timeout elapses.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
    }
}

/// A command's exit status, normalized to what the adapter layer actually
/// cares about: whether it ran at all, its exit code, and captured stdout.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn succeeded_with_code(&self, code: i32) -> bool {
        self.exit_code == Some(code)
    }
}

pub async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandResult, String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    let output = run_with_timeout(cmd, timeout, program).await?;
    Ok(CommandResult {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
