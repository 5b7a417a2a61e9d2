// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Decorator over `AptAdapter`: when the host's Ubuntu Pro client (`pro`) is
//! present and at a minimum version, it becomes the source of truth for
//! security and `esm-infra`/`esm-apps` updates; otherwise every call falls
//! back to the native apt queries the inner adapter already provides.

use super::{
    apt::AptAdapter, AutoOsPatchState, AvailablePackage, InstallOutcome, PackageFilter,
    PackageManager, PackageManagerError, PatchModeManager,
};
use crate::subprocess::{run_command, PACKAGE_MANAGER_COMMAND_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Minimum `pro` client version that exposes `pro api u.pro.security.status`.
const MINIMUM_PRO_CLIENT_VERSION: &str = "27.9";

pub struct UbuntuProAdapter {
    inner: AptAdapter,
    pro_client_available: Mutex<Option<bool>>,
}

impl Default for UbuntuProAdapter {
    fn default() -> Self {
        Self {
            inner: AptAdapter::new(),
            pro_client_available: Mutex::new(None),
        }
    }
}

impl UbuntuProAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes `pro version` once per process and caches the capability
    /// determination; a missing or too-old client is not an error, just a
    /// signal to fall back to plain apt.
    async fn pro_client_capable(&self) -> bool {
        if let Some(known) = *self.pro_client_available.lock() {
            return known;
        }
        let capable = match run_command("pro", &["version"], PACKAGE_MANAGER_COMMAND_TIMEOUT).await {
            Ok(result) if result.exit_code == Some(0) => {
                version_at_least(&result.stdout, MINIMUM_PRO_CLIENT_VERSION)
            }
            _ => false,
        };
        *self.pro_client_available.lock() = Some(capable);
        capable
    }

    async fn pro_security_status(&self) -> Option<Vec<AvailablePackage>> {
        let result = run_command(
            "pro",
            &["api", "u.pro.security.status.packages.v1"],
            PACKAGE_MANAGER_COMMAND_TIMEOUT,
        )
        .await
        .ok()?;
        if result.exit_code != Some(0) {
            return None;
        }
        Some(parse_pro_security_packages(&result.stdout))
    }
}

#[async_trait]
impl PackageManager for UbuntuProAdapter {
    fn name(&self) -> &'static str {
        "apt+ubuntu-pro"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        self.inner.refresh_repo().await
    }

    async fn get_all_updates(&self, cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        self.inner.get_all_updates(cached).await
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        if self.pro_client_capable().await {
            if let Some(packages) = self.pro_security_status().await {
                return Ok(packages);
            }
        }
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
        self.inner.install_updates(filter, packages).await
    }

    fn patch_mode_manager(&self) -> &dyn PatchModeManager {
        self.inner.patch_mode_manager()
    }
}

#[async_trait]
impl PatchModeManager for UbuntuProAdapter {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError> {
        self.inner.patch_mode_manager().get_current_auto_os_patch_state().await
    }

    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError> {
        self.inner.patch_mode_manager().disable_auto_os_update().await
    }

    async fn backup_image_default_config_if_absent(&self, backup_path: &std::path::Path) -> Result<(), PackageManagerError> {
        self.inner
            .patch_mode_manager()
            .backup_image_default_config_if_absent(backup_path)
            .await
    }
}

/// Parses `esm-infra`/`esm-apps` package names out of `pro api
/// u.pro.security.status.packages.v1` JSON output. Falls back to an empty
/// list (not an error) on any shape mismatch, since the caller already
/// treats "no answer" as "fall back to apt".
fn parse_pro_security_packages(stdout: &str) -> Vec<AvailablePackage> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) else {
        return Vec::new();
    };
    let Some(packages) = value
        .pointer("/data/attributes/packages")
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };
    packages
        .iter()
        .filter_map(|pkg| {
            let name = pkg.get("package")?.as_str()?.to_string();
            let version = pkg
                .get("version")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Some(AvailablePackage { name, version })
        })
        .collect()
}

fn version_at_least(version_output: &str, minimum: &str) -> bool {
    let extract = |s: &str| -> Option<(u32, u32)> {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
        let mut parts = digits.split('.').filter_map(|p| p.parse::<u32>().ok());
        Some((parts.next()?, parts.next().unwrap_or(0)))
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
    fn parses_pro_security_status_packages() {
        let stdout = r#"{"data":{"attributes":{"packages":[{"package":"openssl","version":"1.1.1-esm"}]}}}"#;
        let packages = parse_pro_security_packages(stdout);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "openssl");
    }

    #[test]
    fn unparseable_output_degrades_to_empty() {
        assert!(parse_pro_security_packages("not json").is_empty());
    }

    #[test]
    fn version_at_least_handles_pro_client_versioning() {
        assert!(version_at_least("27.11", "27.9"));
        assert!(!version_at_least("27.1", "27.9"));
    }
}
