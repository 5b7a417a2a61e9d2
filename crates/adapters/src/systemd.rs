// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Systemd Unit Manager (J): idempotent service+timer synthesis for the
//! auto-assessment scheduler unit.

use crate::env::write_atomic_with_retry;
use crate::subprocess::{run_command, PACKAGE_MANAGER_COMMAND_TIMEOUT};
use lpe_core::Iso8601Duration;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use thiserror::Error;

const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";
const ON_BOOT_SEC: &str = "15m";

#[derive(Debug, Error)]
pub enum SystemdError {
    #[error("io error writing unit file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Env(#[from] crate::env::EnvError),
    #[error("systemctl {verb} {unit} failed: {detail}")]
    CommandFailed {
        verb: &'static str,
        unit: String,
        detail: String,
    },
}

/// Manages the `.service`/`.timer` pair for one named unit. Every mutating
/// operation shells out to `systemctl`; failures of diagnostic-only calls
/// (`status`) are never propagated; a non-zero exit from a diagnostic-only
/// `systemctl` call is informative, not fatal.
pub struct SystemdUnitManager {
    unit_dir: PathBuf,
    name: String,
}

impl SystemdUnitManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            unit_dir: PathBuf::from(SYSTEMD_UNIT_DIR),
            name: name.into(),
        }
    }

    #[cfg(test)]
    pub fn with_unit_dir(name: impl Into<String>, unit_dir: PathBuf) -> Self {
        Self { unit_dir, name: name.into() }
    }

    fn service_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", self.name))
    }

    fn timer_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.timer", self.name))
    }

    async fn systemctl(&self, verb: &'static str, unit: &str) -> Result<bool, SystemdError> {
        let result = run_command(
            "systemctl",
            &[verb, unit],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .map_err(|detail| SystemdError::CommandFailed {
            verb,
            unit: unit.to_string(),
            detail,
        })?;
        Ok(result.exit_code == Some(0))
    }

    pub async fn daemon_reload(&self) -> Result<(), SystemdError> {
        run_command("systemctl", &["daemon-reload"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|detail| SystemdError::CommandFailed {
                verb: "daemon-reload",
                unit: String::new(),
                detail,
            })
    }

    pub async fn is_active(&self, kind: UnitKind) -> bool {
        self.systemctl("is-active", &self.qualified(kind))
            .await
            .unwrap_or(false)
    }

    pub async fn is_enabled(&self, kind: UnitKind) -> bool {
        self.systemctl("is-enabled", &self.qualified(kind))
            .await
            .unwrap_or(false)
    }

    fn qualified(&self, kind: UnitKind) -> String {
        match kind {
            UnitKind::Service => format!("{}.service", self.name),
            UnitKind::Timer => format!("{}.timer", self.name),
        }
    }

    /// Removes a unit file if present: stop + disable + delete + reload.
    /// A no-op if the file doesn't exist, matching the original's guard.
    async fn remove_unit(&self, kind: UnitKind, path: &std::path::Path) -> Result<(), SystemdError> {
        if !path.exists() {
            return Ok(());
        }
        let unit = self.qualified(kind);
        let _ = self.systemctl("stop", &unit).await;
        let _ = self.systemctl("disable", &unit).await;
        tokio::fs::remove_file(path)
            .await
            .map_err(|source| SystemdError::Io { path: path.display().to_string(), source })?;
        self.daemon_reload().await
    }

    /// Idempotently (re)creates and enables the service unit (§4.6).
    /// `exec_start` is the absolute shell invocation to re-invoke this
    /// binary in auto-assessment mode.
    pub async fn create_and_set_service_idem(&self, desc: &str, exec_start: &str) -> Result<(), SystemdError> {
        self.remove_unit(UnitKind::Service, &self.service_path()).await?;
        let content = service_unit_content(desc, exec_start);
        write_atomic_with_retry(&self.service_path(), &content).await?;
        set_permissions(&self.service_path(), 0o644).await?;
        self.daemon_reload().await?;
        let _ = self.systemctl("enable", &self.qualified(UnitKind::Service)).await;
        let started = self.systemctl("start", &self.qualified(UnitKind::Service)).await?;
        if !started {
            let _ = self.systemctl("status", &self.qualified(UnitKind::Service)).await;
        }
        Ok(())
    }

    /// Idempotently (re)creates and enables the timer unit (§4.6), using
    /// `interval` (the configured maximum assessment interval) for
    /// `OnUnitActiveSec`.
    pub async fn create_and_set_timer_idem(&self, desc: &str, interval: Iso8601Duration) -> Result<(), SystemdError> {
        self.remove_unit(UnitKind::Timer, &self.timer_path()).await?;
        let content = timer_unit_content(desc, &interval.to_systemd_interval());
        write_atomic_with_retry(&self.timer_path(), &content).await?;
        set_permissions(&self.timer_path(), 0o755).await?;
        self.daemon_reload().await?;
        let _ = self.systemctl("enable", &self.qualified(UnitKind::Timer)).await;
        let _ = self.systemctl("start", &self.qualified(UnitKind::Timer)).await;
        let _ = self.systemctl("status", &self.qualified(UnitKind::Timer)).await;
        Ok(())
    }

    /// Tears down both service and timer units, as done when assessment mode
    /// reverts to `ImageDefault` (§4.2 ConfigurePatching specifics).
    pub async fn remove_service_and_timer(&self) -> Result<(), SystemdError> {
        self.remove_unit(UnitKind::Timer, &self.timer_path()).await?;
        self.remove_unit(UnitKind::Service, &self.service_path()).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Service,
    Timer,
}

async fn set_permissions(path: &std::path::Path, mode: u32) -> Result<(), SystemdError> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|source| SystemdError::Io { path: path.display().to_string(), source })
}

fn service_unit_content(desc: &str, exec_start: &str) -> String {
    format!(
        "\n[Unit]\nDescription={desc}\nAfter=network.target\n\n[Service]\nType=forking\nExecStart={exec_start}\n\n[Install]\nWantedBy=multi-user.target"
    )
}

fn timer_unit_content(desc: &str, on_unit_active_sec: &str) -> String {
    format!(
        "\n[Unit]\nDescription={desc}\n\n[Timer]\nOnBootSec={ON_BOOT_SEC}\nOnUnitActiveSec={on_unit_active_sec}\n\n[Install]\nWantedBy=timers.target"
    )
}

#[cfg(test)]
#[path = "systemd_tests.rs"]
mod tests;
