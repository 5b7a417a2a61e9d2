// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The apt/dpkg adapter: Debian and Ubuntu family distributions.

use super::{
    apply_filter, AutoOsPatchState, AvailablePackage, InstallOutcome, PackageFilter,
    PackageManager, PackageManagerError, PatchModeManager,
};
use crate::subprocess::{run_command, PACKAGE_MANAGER_COMMAND_TIMEOUT};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// `/etc/apt/apt.conf.d/20auto-upgrades` controls the OS's own unattended
/// upgrade cron; disabling it is how ConfigurePatching takes ownership.
const TWENTY_AUTO_UPGRADES_PATH: &str = "/etc/apt/apt.conf.d/20auto-upgrades";

/// Exit codes apt-get itself considers non-fatal for an update/install run.
const ACCEPTABLE_EXIT_CODES: &[i32] = &[0, 100];

pub struct AptAdapter {
    auto_upgrades_path: PathBuf,
}

impl Default for AptAdapter {
    fn default() -> Self {
        Self {
            auto_upgrades_path: PathBuf::from(TWENTY_AUTO_UPGRADES_PATH),
        }
    }
}

impl AptAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_auto_upgrades_path(path: PathBuf) -> Self {
        Self { auto_upgrades_path: path }
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

    /// Builds a temporary apt sources file restricted to `*security*`
    /// archives, for the security-only query path, without touching system
    /// sources files.
    pub async fn write_security_only_sources(
        &self,
        temp_dir: &Path,
        base_sources: &[String],
    ) -> Result<PathBuf, PackageManagerError> {
        let security_lines: Vec<&String> = base_sources
            .iter()
            .filter(|line| line.contains("security"))
            .collect();
        let path = temp_dir.join("lpe-security-only.list");
        let contents = security_lines
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))?;
        Ok(path)
    }
}

#[async_trait]
impl PackageManager for AptAdapter {
    fn name(&self) -> &'static str {
        "apt"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        let result = run_command("apt-get", &["update"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)
    }

    async fn get_all_updates(&self, _cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        let result = run_command(
            "apt-get",
            &["-s", "upgrade"],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .map_err(PackageManagerError::CommandFailed)?;
        Self::classify_exit_code(result.exit_code, &result.stderr)?;
        Ok(parse_simulated_upgrade(&result.stdout))
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        // Without a Pro-client decorator the plain apt adapter has no
        // security-classifying source of truth beyond the `*security*`
        // archive name convention; callers needing Pro's richer answer use
        // `UbuntuProAdapter` instead.
        let all = self.get_all_updates(true).await?;
        Ok(all)
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError> {
        Ok(Path::new("/var/run/reboot-required").exists())
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
            let arg = format!("{}={}", pkg.name, pkg.version);
            let result = run_command(
                "apt-get",
                &["install", "-y", "--only-upgrade", &arg],
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
impl PatchModeManager for AptAdapter {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError> {
        let contents = match tokio::fs::read_to_string(&self.auto_upgrades_path).await {
            Ok(c) => c,
            Err(_) => return Ok(AutoOsPatchState::Disabled),
        };
        let update_enabled = setting_is_true(&contents, "APT::Periodic::Update-Package-Lists");
        let upgrade_enabled = setting_is_true(&contents, "APT::Periodic::Unattended-Upgrade");
        if update_enabled && upgrade_enabled {
            Ok(AutoOsPatchState::Enabled)
        } else {
            Ok(AutoOsPatchState::Disabled)
        }
    }

    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError> {
        let contents =
            "APT::Periodic::Update-Package-Lists \"0\";\nAPT::Periodic::Unattended-Upgrade \"0\";\n";
        tokio::fs::write(&self.auto_upgrades_path, contents)
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))
    }

    async fn backup_image_default_config_if_absent(&self, backup_path: &Path) -> Result<(), PackageManagerError> {
        if backup_path.exists() {
            return Ok(());
        }
        let contents = tokio::fs::read_to_string(&self.auto_upgrades_path)
            .await
            .unwrap_or_default();
        tokio::fs::write(backup_path, contents)
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))
    }
}

fn setting_is_true(contents: &str, key: &str) -> bool {
    contents
        .lines()
        .find(|line| line.contains(key))
        .map(|line| line.contains('"') && line.contains('1'))
        .unwrap_or(false)
}

/// Parses `apt-get -s upgrade` simulation output for the `Inst <name> (<version>` lines.
fn parse_simulated_upgrade(stdout: &str) -> Vec<AvailablePackage> {
    stdout
        .lines()
        .filter(|l| l.starts_with("Inst "))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            parts.next(); // "Inst"
            let name = parts.next()?.to_string();
            let version = parts
                .find(|p| p.starts_with('('))
                .map(|p| p.trim_start_matches('(').to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Some(AvailablePackage { name, version })
        })
        .collect()
}

#[cfg(test)]
#[path = "apt_tests.rs"]
mod tests;
