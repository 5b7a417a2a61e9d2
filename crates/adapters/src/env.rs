// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The Env Layer (A): retrying file I/O, command execution, UTC timestamp
//! formatting, and a handful of platform probes. Every other adapter and
//! the storage crate route file and process access through here so that
//! the retry/backoff policy lives in exactly one place.

use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Retries applied to CoreState/ExtState/AssessmentState reads and writes
/// (§4.5.4).
pub const MAX_FILE_OPERATION_RETRY_COUNT: u32 = 5;

pub const UTC_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("io error after {attempts} attempt(s) on {path}: {source}")]
    Io {
        path: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Current UTC time formatted per the wire contract (§6).
pub fn now_utc_string() -> String {
    Utc::now().format(UTC_DATETIME_FORMAT).to_string()
}

pub fn now_epoch_secs() -> i64 {
    Utc::now().timestamp()
}

/// Reads a file's contents, retrying with linear backoff
/// (`sleep i+1 seconds`) on failure. If the target path turns out to be a
/// directory, it is removed before the final attempt is reported as a
/// failure — state files must be regular files, never directories.
pub async fn read_to_string_with_retry(path: &Path) -> Result<String, EnvError> {
    let mut attempt = 0u32;
    loop {
        if path.is_dir() {
            let _ = tokio::fs::remove_dir_all(path).await;
        }
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => return Ok(contents),
            Err(source) => {
                attempt += 1;
                if attempt >= MAX_FILE_OPERATION_RETRY_COUNT {
                    return Err(EnvError::Io {
                        path: path.display().to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }
    }
}

/// Writes a file atomically (temp-file + rename in the same directory) with
/// retry on failure, tolerant of the target being a stale directory.
pub async fn write_atomic_with_retry(path: &Path, contents: &str) -> Result<(), EnvError> {
    let mut attempt = 0u32;
    loop {
        if path.is_dir() {
            let _ = tokio::fs::remove_dir_all(path).await;
        }
        match write_atomic_once(path, contents).await {
            Ok(()) => return Ok(()),
            Err(source) => {
                attempt += 1;
                if attempt >= MAX_FILE_OPERATION_RETRY_COUNT {
                    return Err(EnvError::Io {
                        path: path.display().to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }
    }
}

async fn write_atomic_once(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id()
    ));
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Whether systemd is the running init system (`/run/systemd/system` exists).
pub fn systemd_exists() -> bool {
    Path::new("/run/systemd/system").is_dir()
}

/// Process id of the current process, used for CoreState/AssessmentState
/// ownership bookkeeping.
pub fn current_pid() -> i64 {
    std::process::id() as i64
}

/// Whether a process with the given pid is currently alive.
pub fn pid_is_alive(pid: i64) -> bool {
    if pid <= 0 {
        return false;
    }
    Path::new(&format!("/proc/{pid}")).is_dir()
}

/// Best-effort machine descriptor for perf-log correlation (the
/// `MachineInfo` perf-log field): distro name/version read from
/// `/etc/os-release`, plus the running architecture. Read once per process;
/// callers that emit many perf-log events should cache the result.
pub fn machine_info() -> String {
    let contents = std::fs::read_to_string("/etc/os-release").unwrap_or_default();
    let (name, version) = parse_os_release(&contents);
    format!("{name} {version} ({})", std::env::consts::ARCH)
}

fn parse_os_release(contents: &str) -> (String, String) {
    let mut name = "unknown".to_string();
    let mut version = "unknown".to_string();
    for line in contents.lines() {
        if let Some(v) = line.strip_prefix("NAME=") {
            name = v.trim_matches('"').to_string();
        } else if let Some(v) = line.strip_prefix("VERSION_ID=") {
            version = v.trim_matches('"').to_string();
        }
    }
    (name, version)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
