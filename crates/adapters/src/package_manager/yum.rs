// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The yum adapter. RHEL/CentOS family; classification plugins are not
//! assumed present, so security updates degrade to the full update set.

use super::{
    apply_filter, AutoOsPatchState, AvailablePackage, InstallOutcome, PackageFilter,
    PackageManager, PackageManagerError, PatchModeManager,
};
use crate::subprocess::{run_command, PACKAGE_MANAGER_COMMAND_TIMEOUT};
use async_trait::async_trait;

const ACCEPTABLE_EXIT_CODES: &[i32] = &[0, 100];

#[derive(Default)]
pub struct YumAdapter;

impl YumAdapter {
    pub fn new() -> Self {
        Self
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
impl PackageManager for YumAdapter {
    fn name(&self) -> &'static str {
        "yum"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        let result = run_command("yum", &["clean", "expire-cache"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)
    }

    async fn get_all_updates(&self, _cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        let result = run_command(
            "yum",
            &["check-update", "--security"],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .map_err(PackageManagerError::CommandFailed)?;
        // yum check-update exits 100 when updates are available; both 0
        // (nothing to do) and 100 are acceptable.
        Self::classify_exit_code(result.exit_code, &result.stderr)?;
        Ok(parse_check_update(&result.stdout))
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        // No classification plugin assumed present: degrade gracefully to
        // the full update set, per §4.1.
        self.get_all_updates(true).await
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError> {
        let result = run_command("needs-restarting", &["-r"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        // needs-restarting -r exits 1 when a reboot is required.
        Ok(result.exit_code == Some(1))
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
            let arg = format!("{}-{}", pkg.name, pkg.version);
            let result = run_command("yum", &["update", "-y", &arg], PACKAGE_MANAGER_COMMAND_TIMEOUT)
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
impl PatchModeManager for YumAdapter {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError> {
        // yum-cron's presence/enablement is the closest analog; without a
        // dedicated unit the state is reported unknown rather than guessed.
        Ok(AutoOsPatchState::Unknown)
    }

    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError> {
        let result = run_command(
            "systemctl",
            &["disable", "--now", "yum-cron"],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)
    }

    async fn backup_image_default_config_if_absent(&self, backup_path: &std::path::Path) -> Result<(), PackageManagerError> {
        if backup_path.exists() {
            return Ok(());
        }
        tokio::fs::write(backup_path, "yum-cron-enabled=unknown\n")
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))
    }
}

fn parse_check_update(stdout: &str) -> Vec<AvailablePackage> {
    stdout
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with("Loaded") && !l.starts_with("Last"))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            let name = parts.next()?.split('.').next()?.to_string();
            let version = parts.next()?.to_string();
            Some(AvailablePackage { name, version })
        })
        .collect()
}
