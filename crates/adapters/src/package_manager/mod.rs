// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Package Manager Adapter (G): the capability interface the engine
//! consumes, plus its distribution-specific variants.

pub mod apt;
pub mod tdnf;
pub mod ubuntu_pro;
pub mod yum;
pub mod zypper;

pub use apt::AptAdapter;
pub use tdnf::{AzureLinuxTdnfAdapter, TdnfAdapter};
pub use ubuntu_pro::UbuntuProAdapter;
pub use yum::YumAdapter;
pub use zypper::ZypperAdapter;

use async_trait::async_trait;
use lpe_core::{Classification, Iso8601Duration};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PackageManagerError {
    #[error("package manager command failed: {0}")]
    CommandFailed(String),
    #[error("package manager reported an unexpected exit code {code}: {detail}")]
    UnexpectedExitCode { code: i32, detail: String },
    #[error("package manager timed out: {0}")]
    Timeout(String),
}

/// One package as reported by `GetAllUpdates`/`GetSecurityUpdates`/`GetOtherUpdates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailablePackage {
    pub name: String,
    pub version: String,
}

/// Outcome of an `InstallUpdates` call: the package partitioned by result.
#[derive(Debug, Clone, Default)]
pub struct InstallOutcome {
    pub installed: Vec<AvailablePackage>,
    pub pending: Vec<AvailablePackage>,
    pub failed: Vec<AvailablePackage>,
    pub excluded: Vec<AvailablePackage>,
}

/// Name/classification-based filter applied before querying or installing.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub classifications_to_include: Vec<Classification>,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl PackageFilter {
    /// Whether a package name survives the include/exclude glob filter.
    /// An empty include list means "everything not excluded."
    pub fn matches_name(&self, name: &str) -> bool {
        use glob::Pattern;
        let excluded = self
            .exclude_globs
            .iter()
            .filter_map(|g| Pattern::new(g).ok())
            .any(|p| p.matches(name));
        if excluded {
            return false;
        }
        if self.include_globs.is_empty() {
            return true;
        }
        self.include_globs
            .iter()
            .filter_map(|g| Pattern::new(g).ok())
            .any(|p| p.matches(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoOsPatchState {
    Enabled,
    Disabled,
    Unknown,
}

/// Interrogation and mutation of a distribution's own auto-update setting,
/// implemented per-adapter against its native configuration file.
#[async_trait]
pub trait PatchModeManager: Send + Sync {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError>;
    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError>;
    async fn backup_image_default_config_if_absent(&self, backup_path: &std::path::Path) -> Result<(), PackageManagerError>;
}

/// The contract the engine drives every patch operator against (§4.1).
#[async_trait]
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;

    async fn refresh_repo(&self) -> Result<(), PackageManagerError>;

    async fn get_all_updates(&self, cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError>;

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError>;

    /// Default implementation: all updates minus the security subset,
    /// order preserved, which is correct for every adapter that cannot
    /// distinguish classifications natively (§4.1, Yum/Tdnf).
    async fn get_other_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        let all = self.get_all_updates(true).await?;
        let security = self.get_security_updates().await?;
        Ok(all
            .into_iter()
            .filter(|p| !security.iter().any(|s| s.name == p.name))
            .collect())
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError>;

    async fn install_updates(
        &self,
        filter: &PackageFilter,
        packages: &[AvailablePackage],
    ) -> Result<InstallOutcome, PackageManagerError>;

    /// Constrains installable packages to a repository snapshot as of the
    /// given publish date. No-op for every adapter except the strict-SDP
    /// AzureLinux-Tdnf variant.
    async fn set_max_patch_publish_date(&self, _max_publish_date: Option<&str>) -> Result<(), PackageManagerError> {
        Ok(())
    }

    fn patch_mode_manager(&self) -> &dyn PatchModeManager;
}

/// Shared helper: applies name/classification filtering to a raw update list.
pub fn apply_filter(
    packages: Vec<AvailablePackage>,
    filter: &PackageFilter,
) -> (Vec<AvailablePackage>, Vec<AvailablePackage>) {
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for pkg in packages {
        if filter.matches_name(&pkg.name) {
            included.push(pkg);
        } else {
            excluded.push(pkg);
        }
    }
    (included, excluded)
}

/// Interval used by the systemd timer conversion; re-exported here so
/// adapters that need to format one (none currently do) share the type.
pub type AssessmentInterval = Iso8601Duration;

/// One-time distribution probe: selects the adapter variant by checking for
/// each package manager's binary on `PATH`, in the order a multi-manager
/// host is least likely to be ambiguous. `AzureLinux-Tdnf` is selected over
/// plain `Tdnf` when `/etc/os-release` identifies the Azure Linux/Mariner
/// distribution family, since only that family ships the strict-SDP
/// repository snapshot semantics §4.1 describes.
pub fn detect() -> Box<dyn PackageManager> {
    if binary_exists("apt-get") {
        if binary_exists("pro") {
            return Box::new(UbuntuProAdapter::new());
        }
        return Box::new(AptAdapter::new());
    }
    if binary_exists("tdnf") {
        if is_azure_linux_family() {
            return Box::new(AzureLinuxTdnfAdapter::new());
        }
        return Box::new(TdnfAdapter::new());
    }
    if binary_exists("zypper") {
        return Box::new(ZypperAdapter::new());
    }
    // yum is the fallback: every RHEL-family host that lacks tdnf/zypper
    // has it, and YumAdapter already degrades gracefully when it is absent.
    Box::new(YumAdapter::new())
}

fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
        .unwrap_or(false)
}

fn is_azure_linux_family() -> bool {
    std::fs::read_to_string("/etc/os-release")
        .map(|contents| {
            let lower = contents.to_ascii_lowercase();
            lower.contains("mariner") || lower.contains("azure linux")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_include_list_matches_everything_not_excluded() {
        let filter = PackageFilter {
            classifications_to_include: vec![],
            include_globs: vec![],
            exclude_globs: vec!["libc*".to_string()],
        };
        assert!(filter.matches_name("openssl"));
        assert!(!filter.matches_name("libc6"));
    }

    #[test]
    fn include_glob_restricts_to_matches() {
        let filter = PackageFilter {
            classifications_to_include: vec![],
            include_globs: vec!["openssl*".to_string()],
            exclude_globs: vec![],
        };
        assert!(filter.matches_name("openssl"));
        assert!(!filter.matches_name("curl"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = PackageFilter {
            classifications_to_include: vec![],
            include_globs: vec!["open*".to_string()],
            exclude_globs: vec!["openssl".to_string()],
        };
        assert!(!filter.matches_name("openssl"));
        assert!(filter.matches_name("openvpn"));
    }
}
