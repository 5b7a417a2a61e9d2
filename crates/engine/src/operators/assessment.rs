// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Assessment operator: refreshes the repository, classifies available
//! updates, probes reboot-pending state, and reports `PatchAssessmentSummary`.

use super::{OperatorContext, OperatorError};
use async_trait::async_trait;
use lpe_adapters::package_manager::{apply_filter, PackageFilter};
use lpe_core::{Classification, PackageRecord, PatchState, Status, SubstatusName};

/// Subtracted from `maximum_assessment_interval` to form the eligibility
/// threshold, so auto-assessment runs slightly ahead of the full interval
/// rather than drifting later with every poll cycle.
pub const AUTO_ASSESSMENT_INTERVAL_BUFFER_SECS: i64 = 300;

pub struct AssessmentOperator;

impl AssessmentOperator {
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
}

#[async_trait]
impl super::Operator for AssessmentOperator {
    fn substatus_name(&self) -> SubstatusName {
        SubstatusName::PatchAssessmentSummary
    }

    fn max_retry(&self) -> u32 {
        super::MAX_RETRY_ASSESSMENT
    }

    async fn should_run(&self, ctx: &OperatorContext) -> bool {
        if !ctx.config.exec_auto_assess_only {
            return true;
        }
        let Some(maximum_interval) = ctx.config.maximum_assessment_interval else {
            return true;
        };
        let state = match ctx.lifecycle.read_assessment_state().await {
            Some(s) => s,
            None => return true,
        };
        let now = ctx.lifecycle.clock().now_epoch_secs();
        let elapsed = now - state.last_start_in_seconds_since_epoch;
        if elapsed < 0 {
            return true;
        }
        let required = (maximum_interval.seconds() - AUTO_ASSESSMENT_INTERVAL_BUFFER_SECS).max(0);
        elapsed >= required
    }

    async fn start_retryable_unit(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        ctx.lifecycle
            .record_assessment_attempt_start(ctx.config.sequence_number)
            .await
            .map_err(|e| OperatorError::Failed(e.to_string()))?;

        ctx.status.reset_substatus(SubstatusName::PatchAssessmentSummary);
        ctx.status.set_current_operation(lpe_core::PatchOperation::Assessment);

        ctx.package_manager
            .refresh_repo()
            .await
            .map_err(|e| OperatorError::Failed(e.to_string()))?;

        let all = ctx
            .package_manager
            .get_all_updates(false)
            .await
            .map_err(|e| OperatorError::Failed(e.to_string()))?;
        let security = ctx
            .package_manager
            .get_security_updates()
            .await
            .map_err(|e| OperatorError::Failed(e.to_string()))?;

        let filter = Self::build_filter(ctx);
        let (matched, _excluded) = apply_filter(all, &filter);

        let reboot_pending = ctx
            .package_manager
            .is_reboot_pending()
            .await
            .unwrap_or(false);

        let security_names: std::collections::HashSet<_> = security.iter().map(|p| p.name.clone()).collect();
        let patches: Vec<PackageRecord> = matched
            .into_iter()
            .map(|p| {
                let classification = if security_names.contains(&p.name) {
                    Classification::Security
                } else {
                    Classification::Other
                };
                PackageRecord::new(p.name, p.version, vec![classification], PatchState::Available)
            })
            .collect();

        ctx.status
            .set_patch_assessment_substatus_json(Status::Success, patches, reboot_pending);
        ctx.status.persist().await.map_err(|e| OperatorError::Failed(e.to_string()))?;
        Ok(())
    }

    async fn on_terminal_exception(&self, ctx: &OperatorContext, err: &OperatorError) {
        ctx.status.add_error(
            lpe_core::ErrorCode::OperationFailed,
            &err.to_string(),
            Some(lpe_core::PatchOperation::Assessment),
        );
        ctx.status
            .set_patch_assessment_substatus_json(Status::Error, Vec::new(), false);
        let _ = ctx.status.persist().await;
    }
}

#[cfg(test)]
#[path = "assessment_tests.rs"]
mod tests;
