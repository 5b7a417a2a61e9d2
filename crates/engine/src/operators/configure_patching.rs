// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ConfigurePatching operator: disables distro-native auto-update when the
//! platform owns patch mode, and reconciles the auto-assessment systemd
//! unit with the requested assessment mode.

use super::{OperatorContext, OperatorError};
use crate::fault::OperatorFault;
use async_trait::async_trait;
use lpe_adapters::package_manager::AutoOsPatchState;
use lpe_adapters::systemd::SystemdUnitManager;
use lpe_core::{ErrorCode, PlatformMode, Status, SubstatusName};
use std::path::PathBuf;

/// Name of the systemd unit pair installed for platform-driven auto
/// assessment; re-invokes this same binary in `-autoAssessOnly` mode.
pub const AUTO_ASSESSMENT_UNIT_NAME: &str = "azgps-lpe-core-auto-assessment";

pub struct ConfigurePatchingOperator {
    pub systemd: SystemdUnitManager,
    pub auto_os_patch_backup_path: PathBuf,
    pub exec_start_command: String,
}

impl ConfigurePatchingOperator {
    async fn configure_auto_os_patch_state(&self, ctx: &OperatorContext) -> Result<&'static str, OperatorError> {
        if ctx.config.patch_mode != PlatformMode::AutomaticByPlatform {
            return Ok("ImageDefault");
        }
        let patch_mode_manager = ctx.package_manager.patch_mode_manager();
        let current = patch_mode_manager
            .get_current_auto_os_patch_state()
            .await
            .map_err(|e| OperatorError::Failed(e.to_string()))?;
        if current != AutoOsPatchState::Disabled {
            patch_mode_manager
                .backup_image_default_config_if_absent(&self.auto_os_patch_backup_path)
                .await
                .map_err(|e| OperatorError::Failed(e.to_string()))?;
            patch_mode_manager
                .disable_auto_os_update()
                .await
                .map_err(|e| OperatorError::Failed(e.to_string()))?;
        }
        Ok("Disabled")
    }

    async fn configure_auto_assessment(&self, ctx: &OperatorContext) -> Result<&'static str, OperatorError> {
        match ctx.config.assessment_mode {
            PlatformMode::ImageDefault => {
                self.systemd
                    .remove_service_and_timer()
                    .await
                    .map_err(|e| OperatorError::Failed(e.to_string()))?;
                Ok("ImageDefault")
            }
            PlatformMode::AutomaticByPlatform => {
                if !lpe_adapters::env::systemd_exists() {
                    ctx.status.add_error(
                        ErrorCode::ClSystemdNotPresent,
                        "systemd is required for AutomaticByPlatform assessment mode but is not present",
                        Some(lpe_core::PatchOperation::ConfigurePatching),
                    );
                    return Err(OperatorError::Fault(OperatorFault::ExitRequested));
                }
                self.systemd
                    .create_and_set_service_idem("azgps-lpe-core auto-assessment", &self.exec_start_command)
                    .await
                    .map_err(|e| OperatorError::Failed(e.to_string()))?;
                let interval = ctx
                    .config
                    .maximum_assessment_interval
                    .unwrap_or(lpe_core::Iso8601Duration::from_seconds(3600));
                self.systemd
                    .create_and_set_timer_idem("azgps-lpe-core auto-assessment timer", interval)
                    .await
                    .map_err(|e| OperatorError::Failed(e.to_string()))?;
                Ok("Enabled")
            }
        }
    }
}

#[async_trait]
impl super::Operator for ConfigurePatchingOperator {
    fn substatus_name(&self) -> SubstatusName {
        SubstatusName::ConfigurePatchingSummary
    }

    fn max_retry(&self) -> u32 {
        super::MAX_RETRY_CONFIGURE_PATCHING
    }

    async fn start_retryable_unit(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        ctx.status.set_current_operation(lpe_core::PatchOperation::ConfigurePatching);
        let auto_os_patch_state = self.configure_auto_os_patch_state(ctx).await?;
        let auto_assessment_state = self.configure_auto_assessment(ctx).await?;

        // Held in Transitioning until Assessment also reaches a terminal
        // state; the engine finalizes this substatus after Assessment runs.
        ctx.status
            .set_configure_patching_substatus_json(Status::Transitioning, auto_os_patch_state, auto_assessment_state);
        ctx.status.persist().await.map_err(|e| OperatorError::Failed(e.to_string()))?;
        Ok(())
    }

    async fn on_terminal_exception(&self, ctx: &OperatorContext, err: &OperatorError) {
        ctx.status.add_error(
            ErrorCode::OperationFailed,
            &err.to_string(),
            Some(lpe_core::PatchOperation::ConfigurePatching),
        );
        ctx.status
            .set_configure_patching_substatus_json(Status::Error, "Unknown", "Unknown");
        let _ = ctx.status.persist().await;
    }
}

/// Finalizes `ConfigurePatchingSummary` once Assessment has reached a
/// terminal state, per the "held in Transitioning" invariant.
pub fn finalize(ctx: &OperatorContext, auto_os_patch_state: &str, auto_assessment_state: &str) {
    let assessment_status = ctx.status.substatus_status(SubstatusName::PatchAssessmentSummary);
    let final_status = if assessment_status == Status::Error { Status::Warning } else { Status::Success };
    ctx.status
        .set_configure_patching_substatus_json(final_status, auto_os_patch_state, auto_assessment_state);
}

#[cfg(test)]
#[path = "configure_patching_tests.rs"]
mod tests;
