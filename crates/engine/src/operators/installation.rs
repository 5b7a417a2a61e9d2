// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Installation operator: installs the filtered package list in bounded
//! batches, consulting the Maintenance Window before each, then re-runs
//! Assessment once installation finishes.

use super::{OperatorContext, OperatorError};
use crate::fault::OperatorFault;
use crate::maintenance_window::MaintenanceWindow;
use async_trait::async_trait;
use lpe_adapters::package_manager::{apply_filter, AvailablePackage, PackageFilter};
use lpe_core::{Classification, ErrorCode, PackageRecord, PatchState, Status, SubstatusName};

/// Packages are installed this many at a time, so a long-running batch
/// cannot blow past the maintenance window without a checkpoint.
pub const MAX_BATCH_SIZE_FOR_PACKAGES: usize = 3;

pub struct InstallationOperator;

impl InstallationOperator {
    fn build_filter(ctx: &OperatorContext) -> PackageFilter {
        let classifications_to_include = ctx
            .config
            .classifications_to_include
            .iter()
            .filter_map(|c| Classification::parse(c))
            .collect();
        PackageFilter {
            classifications_to_include,
            include_globs: ctx.config.patches_to_include.clone(),
            exclude_globs: ctx.config.patches_to_exclude.clone(),
        }
    }

    fn window(ctx: &OperatorContext) -> Result<MaintenanceWindow, OperatorError> {
        MaintenanceWindow::from_iso_start(&ctx.config.start_time, ctx.config.maximum_duration, ctx.config.reboot_setting)
            .map_err(|e| OperatorError::Failed(e.to_string()))
    }
}

#[async_trait]
impl super::Operator for InstallationOperator {
    fn substatus_name(&self) -> SubstatusName {
        SubstatusName::PatchInstallationSummary
    }

    fn max_retry(&self) -> u32 {
        super::MAX_RETRY_INSTALLATION
    }

    async fn start_retryable_unit(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        ctx.status.set_current_operation(lpe_core::PatchOperation::Installation);

        let candidates = ctx
            .package_manager
            .get_all_updates(true)
            .await
            .map_err(|e| OperatorError::Failed(e.to_string()))?;
        let filter = Self::build_filter(ctx);
        let (matched, excluded) = apply_filter(candidates, &filter);

        let window = Self::window(ctx)?;
        let now = ctx.lifecycle.clock().now_epoch_secs();

        let mut records: Vec<PackageRecord> = excluded
            .into_iter()
            .map(|p| PackageRecord::new(p.name, p.version, vec![Classification::Other], PatchState::Excluded))
            .collect();

        let mut exceeded = false;
        for batch in matched.chunks(MAX_BATCH_SIZE_FOR_PACKAGES) {
            let remaining = window.remaining_minutes(now);
            if !window.is_package_install_time_available(remaining, batch.len()) {
                ctx.status.add_error(
                    ErrorCode::SvMaintenanceWindowError,
                    "maintenance window exceeded before all batches installed",
                    Some(lpe_core::PatchOperation::Installation),
                );
                for pkg in batch {
                    records.push(PackageRecord::new(
                        pkg.name.clone(),
                        pkg.version.clone(),
                        vec![Classification::Other],
                        PatchState::Pending,
                    ));
                }
                exceeded = true;
                break;
            }

            let outcome = ctx
                .package_manager
                .install_updates(&filter, batch)
                .await
                .map_err(|e| OperatorError::Failed(e.to_string()))?;

            records.extend(as_records(outcome.installed, PatchState::Installed));
            records.extend(as_records(outcome.failed, PatchState::Failed));
            records.extend(as_records(outcome.pending, PatchState::Pending));
            records.extend(as_records(outcome.excluded, PatchState::Excluded));
        }

        let status = if exceeded { Status::Error } else { Status::Success };
        ctx.status
            .set_patch_installation_substatus_json(status, records, exceeded, ctx.config.maintenance_run_id.as_deref());
        ctx.status.persist().await.map_err(|e| OperatorError::Failed(e.to_string()))?;

        if !exceeded {
            let reboot_pending = ctx
                .package_manager
                .is_reboot_pending()
                .await
                .map_err(|e| OperatorError::Failed(e.to_string()))?;
            let remaining = window.remaining_minutes(ctx.lifecycle.clock().now_epoch_secs());
            if window.start_if_required_and_time_available(remaining, reboot_pending) {
                return Err(OperatorFault::RebootRequested.into());
            }
        }

        Ok(())
    }

    async fn on_terminal_exception(&self, ctx: &OperatorContext, err: &OperatorError) {
        ctx.status.add_error(
            ErrorCode::OperationFailed,
            &err.to_string(),
            Some(lpe_core::PatchOperation::Installation),
        );
        ctx.status
            .set_patch_installation_substatus_json(Status::Error, Vec::new(), false, None);
        let _ = ctx.status.persist().await;
    }
}

fn as_records(packages: Vec<AvailablePackage>, state: PatchState) -> Vec<PackageRecord> {
    packages
        .into_iter()
        .map(|p| PackageRecord::new(p.name, p.version, vec![Classification::Other], state))
        .collect()
}

/// Marks Installation as failed specifically because the post-install
/// re-assessment failed, per the engine's finalization step.
pub fn mark_assessment_failed(ctx: &OperatorContext) {
    ctx.status.add_error(
        ErrorCode::OperationFailed,
        "INSTALLATION_FAILED_DUE_TO_ASSESSMENT_FAILURE",
        Some(lpe_core::PatchOperation::Installation),
    );
    ctx.status.force_substatus_error(SubstatusName::PatchInstallationSummary);
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
