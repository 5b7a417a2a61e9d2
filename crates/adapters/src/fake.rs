// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only in-memory stand-ins for the package-manager contract, gated
//! behind the `test-support` feature so `lpe-engine`'s tests can drive the
//! patch operators without shelling out to a real package manager.

use crate::package_manager::{
    apply_filter, AutoOsPatchState, AvailablePackage, InstallOutcome, PackageFilter,
    PackageManager, PackageManagerError, PatchModeManager,
};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Canned responses and a call log, so a test can assert both outcomes and
/// interaction order without real subprocess I/O.
pub struct FakePackageManager {
    pub all_updates: Mutex<Vec<AvailablePackage>>,
    pub security_updates: Mutex<Vec<AvailablePackage>>,
    pub reboot_pending: Mutex<bool>,
    pub auto_os_patch_state: Mutex<AutoOsPatchState>,
    pub install_failures: Mutex<Vec<String>>,
    pub refresh_repo_calls: Mutex<u32>,
    pub install_calls: Mutex<u32>,
    pub disable_auto_os_update_calls: Mutex<u32>,
    pub fail_refresh_repo: Mutex<bool>,
    pub fail_get_all_updates: Mutex<bool>,
}

impl Default for FakePackageManager {
    fn default() -> Self {
        Self {
            all_updates: Mutex::new(Vec::new()),
            security_updates: Mutex::new(Vec::new()),
            reboot_pending: Mutex::new(false),
            auto_os_patch_state: Mutex::new(AutoOsPatchState::Enabled),
            install_failures: Mutex::new(Vec::new()),
            refresh_repo_calls: Mutex::new(0),
            install_calls: Mutex::new(0),
            disable_auto_os_update_calls: Mutex::new(0),
            fail_refresh_repo: Mutex::new(false),
            fail_get_all_updates: Mutex::new(false),
        }
    }
}

impl FakePackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_updates(self, all: Vec<AvailablePackage>, security: Vec<AvailablePackage>) -> Self {
        *self.all_updates.lock() = all;
        *self.security_updates.lock() = security;
        self
    }

    pub fn fail_package(&self, name: &str) {
        self.install_failures.lock().push(name.to_string());
    }
}

#[async_trait]
impl PackageManager for FakePackageManager {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn refresh_repo(&self) -> Result<(), PackageManagerError> {
        *self.refresh_repo_calls.lock() += 1;
        if *self.fail_refresh_repo.lock() {
            return Err(PackageManagerError::CommandFailed("fake refresh_repo failure".into()));
        }
        Ok(())
    }

    async fn get_all_updates(&self, _cached: bool) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        if *self.fail_get_all_updates.lock() {
            return Err(PackageManagerError::CommandFailed("fake get_all_updates failure".into()));
        }
        Ok(self.all_updates.lock().clone())
    }

    async fn get_security_updates(&self) -> Result<Vec<AvailablePackage>, PackageManagerError> {
        Ok(self.security_updates.lock().clone())
    }

    async fn is_reboot_pending(&self) -> Result<bool, PackageManagerError> {
        Ok(*self.reboot_pending.lock())
    }

    async fn install_updates(
        &self,
        filter: &PackageFilter,
        packages: &[AvailablePackage],
    ) -> Result<InstallOutcome, PackageManagerError> {
        *self.install_calls.lock() += 1;
        let (included, excluded) = apply_filter(packages.to_vec(), filter);
        let failures = self.install_failures.lock().clone();
        let mut outcome = InstallOutcome { excluded, ..Default::default() };
        for pkg in included {
            if failures.contains(&pkg.name) {
                outcome.failed.push(pkg);
            } else {
                outcome.installed.push(pkg);
            }
        }
        Ok(outcome)
    }

    fn patch_mode_manager(&self) -> &dyn PatchModeManager {
        self
    }
}

#[async_trait]
impl PatchModeManager for FakePackageManager {
    async fn get_current_auto_os_patch_state(&self) -> Result<AutoOsPatchState, PackageManagerError> {
        Ok(*self.auto_os_patch_state.lock())
    }

    async fn disable_auto_os_update(&self) -> Result<(), PackageManagerError> {
        *self.disable_auto_os_update_calls.lock() += 1;
        *self.auto_os_patch_state.lock() = AutoOsPatchState::Disabled;
        Ok(())
    }

    async fn backup_image_default_config_if_absent(&self, _backup_path: &std::path::Path) -> Result<(), PackageManagerError> {
        Ok(())
    }
}
