// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The zypper adapter. SUSE family, with native patch classification.

use super::{
    apply_filter, AutoOsPatchState, AvailablePackage, InstallOutcome, PackageFilter,
    PackageManager, PackageManagerError, PatchModeManager,
};
use crate::subprocess::{run_command, PACKAGE_MANAGER_COMMAND_TIMEOUT};
use async_trait::async_trait;
use std::path::PathBuf;

const AUTOMATIC_ONLINE_UPDATE_PATH: &str = "/etc/sysconfig/automatic_online_update";
const AOU_ENABLE_CRONJOB_KEY: &str = "AOU_ENABLE_CRONJOB";

/// zypper uses 0 (nothing to do), 100 (updates needed), 101 (security
/// updates needed), 102 (reboot needed) as non-failure exits.
const ACCEPTABLE_EXIT_CODES: &[i32] = &[0, 100, 101, 102];

pub struct ZypperAdapter {
    automatic_online_update_path: PathBuf,
}

impl Default for ZypperAdapter {
    fn default() -> Self {
        Self {
            automatic_online_update_path: PathBuf::from(AUTOMATIC_ONLINE_UPDATE_PATH),
        }
    }
}

impl ZypperAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_config_path(path: PathBuf) -> Self {
        Self { automatic_online_update_path: path }
    }

    fn classify_exit_code(code: Option<i32>, stderr: &str) -> Result<(), PackageManagerError> {
        match code {
            Some(c) if ACCEPTABLE_EXIT_CODES.contains(&c) => Ok(()),
            Some(c) => Err(PackageManagerError::UnexpectedExitCode {
                code: c,
                detail: stderr.to_string(),
            }),
            None => Err(PackageManagerError::CommandFailed(
                "process terminated by signal".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PackageManager for ZypperAdapter {
    fn name(&self) -> &'static str {
        "zypper"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        let result = run_command("zypper", &["--non-interactive", "refresh"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)
    }

    async fn get_all_updates(&self, _cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        let result = run_command(
            "zypper",
            &["--non-interactive", "list-patches", "--all"],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)?;
        Ok(parse_patch_list(&result.stdout, None))
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        let result = run_command(
            "zypper",
            &["--non-interactive", "list-patches", "--category", "security"],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)?;
        Ok(parse_patch_list(&result.stdout, Some("security")))
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError> {
        let result = run_command("zypper", &["ps", "-s"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        Ok(result.stdout.to_lowercase().contains("reboot"))
    }

    async fn install_updates(
        &self,
        filter: &PackageFilter,
        packages: &[AvailablePackage],
    ) -> Result<InstallOutcome, PackageManagerError> {
        let (included, excluded) = apply_filter(packages.to_vec(), filter);
        let mut outcome = InstallOutcome {
            excluded,
            ..Default::default()
        };
        for pkg in included {
            let result = run_command(
                "zypper",
                &["--non-interactive", "install", "--force-resolution", &pkg.name],
                PACKAGE_MANAGER_COMMAND_TIMEOUT,
            )
            .await
            .map_err(PackageManagerError::CommandFailed)?;
            match Self::classify_exit_code(result.exit_code, &result.stderr) {
                Ok(()) => outcome.installed.push(pkg),
                Err(_) => outcome.failed.push(pkg),
            }
        }
        Ok(outcome)
    }

    fn patch_mode_manager(&self) -> &dyn PatchModeManager {
        self
    }
}

#[async_trait]
impl PatchModeManager for ZypperAdapter {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError> {
        let contents = match tokio::fs::read_to_string(&self.automatic_online_update_path).await {
            Ok(c) => c,
            // Absence maps to Disabled, per §4.1.
            Err(_) => return Ok(AutoOsPatchState::Disabled),
        };
        let enabled = contents
            .lines()
            .find(|l| l.trim_start().starts_with(AOU_ENABLE_CRONJOB_KEY))
            .map(|l| l.contains("\"true\"") || l.contains("=true"))
            .unwrap_or(false);
        Ok(if enabled { AutoOsPatchState::Enabled } else { AutoOsPatchState::Disabled })
    }

    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError> {
        let contents = format!("{AOU_ENABLE_CRONJOB_KEY}=\"false\"\n");
        tokio::fs::write(&self.automatic_online_update_path, contents)
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))
    }

    async fn backup_image_default_config_if_absent(&self, backup_path: &std::path::Path) -> Result<(), PackageManagerError> {
        if backup_path.exists() {
            return Ok(());
        }
        let contents = tokio::fs::read_to_string(&self.automatic_online_update_path)
            .await
            .unwrap_or_default();
        tokio::fs::write(backup_path, contents)
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))
    }
}

/// Parses `zypper list-patches` table output (columns:
/// `Repository | Name | Category | Severity | Interactive | Summary`).
fn parse_patch_list(stdout: &str, _category: Option<&str>) -> Vec<AvailablePackage> {
    stdout
        .lines()
        .filter(|l| l.contains('|'))
        .filter_map(|l| {
            let cols: Vec<&str> = l.split('|').map(|c| c.trim()).collect();
            if cols.len() < 2 || cols[1].is_empty() || cols[1] == "Name" {
                return None;
            }
            if cols.iter().all(|c| c.chars().all(|ch| ch == '-')) {
                return None;
            }
            Some(AvailablePackage {
                name: cols[1].to_string(),
                version: cols.get(3).unwrap_or(&"unknown").to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "zypper_tests.rs"]
mod tests;
