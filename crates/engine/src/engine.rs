// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Core Execution Engine (K): orchestrates pre-checks, the Lifecycle
//! Manager's start gate, and the three patch operators in the order the
//! wrapper expects.

use crate::fault::OperatorFault;
use crate::lifecycle::{AutoAssessmentGateOutcome, LifecycleManager, StartDecision};
use crate::operators::{
    self, AssessmentOperator, ConfigurePatchingOperator, InstallationOperator, Operator, OperatorContext,
};
use crate::precheck;
use lpe_adapters::package_manager::PackageManager;
use lpe_core::{EnvironmentSettings, ErrorCode, ExecutionConfig, PatchOperation, Status, SubstatusName};
use lpe_storage::{StatusHandler, TelemetryWriter};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to persist status: {0}")]
    Status(#[from] lpe_storage::StatusHandlerError),
    #[error(transparent)]
    Lifecycle(#[from] crate::lifecycle::LifecycleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    Okay,
    CriticalError,
    CriticalErrorNoStatus,
    CriticalErrorReported,
}

impl From<EngineOutcome> for lpe_core::ExitCode {
    fn from(value: EngineOutcome) -> Self {
        match value {
            EngineOutcome::Okay => Self::Okay,
            EngineOutcome::CriticalError => Self::CriticalError,
            EngineOutcome::CriticalErrorNoStatus => Self::CriticalErrorNoStatus,
            EngineOutcome::CriticalErrorReported => Self::CriticalErrorReported,
        }
    }
}

pub struct CoreExecutionEngine {
    pub config: Arc<ExecutionConfig>,
    pub env: EnvironmentSettings,
    pub status: Arc<StatusHandler>,
    pub telemetry: Arc<TelemetryWriter>,
    pub lifecycle: Arc<LifecycleManager>,
    pub package_manager: Arc<dyn PackageManager>,
    pub configure_patching: ConfigurePatchingOperator,
    pub telemetry_agent_version: Option<String>,
}

impl CoreExecutionEngine {
    fn ctx(&self) -> OperatorContext {
        OperatorContext {
            config: self.config.clone(),
            status: self.status.clone(),
            telemetry: self.telemetry.clone(),
            lifecycle: self.lifecycle.clone(),
            package_manager: self.package_manager.clone(),
        }
    }

    pub async fn run(&self) -> EngineOutcome {
        if let Err(fail) = precheck::run_preflight_checks(self.telemetry_agent_version.as_deref()).await {
            for name in lpe_core::SubstatusName::output_order() {
                self.status.add_error(fail.error_code(), &fail.to_string(), Some(operation_owning(*name, self.config.operation)));
            }
            let _ = self.status.persist().await;
            return EngineOutcome::CriticalError;
        }

        cleanup_temp_folder(&self.env.temp_folder).await;

        let sequence_number = self.config.sequence_number;
        let action = self.config.operation.as_str();

        if self.config.exec_auto_assess_only {
            match self
                .lifecycle
                .execution_start_check_auto_assessment(sequence_number, action, &self.status)
                .await
            {
                Ok(AutoAssessmentGateOutcome::TookOver) => {}
                Ok(AutoAssessmentGateOutcome::ExitOkSuperseded) | Ok(AutoAssessmentGateOutcome::TimedOut) => {
                    return EngineOutcome::Okay;
                }
                Err(_) => return EngineOutcome::CriticalErrorNoStatus,
            }

            let fault = operators::run_with_retries(&AssessmentOperator, &self.ctx()).await;
            self.finish(fault).await
        } else {
            match self.lifecycle.execution_start_check(sequence_number).await {
                Ok(StartDecision::ExitOkAlreadyDone) | Ok(StartDecision::ExitOkSuperseded) => {
                    return EngineOutcome::Okay;
                }
                Ok(StartDecision::Proceed) => {
                    let _ = self.lifecycle.start_run(sequence_number, action).await;
                }
                Err(_) => return EngineOutcome::CriticalErrorNoStatus,
            }

            self.run_full_pipeline().await
        }
    }

    async fn run_full_pipeline(&self) -> EngineOutcome {
        let ctx = self.ctx();

        if let Some(fault) = operators::run_with_retries(&self.configure_patching, &ctx).await {
            return self.finish(Some(fault)).await;
        }

        let assessment_fault = operators::run_with_retries(&AssessmentOperator, &ctx).await;
        crate::operators::configure_patching::finalize(
            &ctx,
            auto_os_patch_state_label(&ctx).await,
            auto_assessment_state_label(&ctx),
        );
        let _ = self.status.persist().await;
        if assessment_fault.is_some() {
            return self.finish(assessment_fault).await;
        }

        if self.config.operation == PatchOperation::Installation {
            if let Some(fault) = operators::run_with_retries(&InstallationOperator, &ctx).await {
                return self.finish(Some(fault)).await;
            }

            ctx.status.reset_substatus(SubstatusName::PatchAssessmentSummary);
            let reassessment_fault = operators::run_with_retries(&AssessmentOperator, &ctx).await;
            if reassessment_fault.is_some() || ctx.status.substatus_status(SubstatusName::PatchAssessmentSummary) == Status::Error {
                crate::operators::installation::mark_assessment_failed(&ctx);
            }
        }

        self.set_health_store_substatus(&ctx);
        self.try_set_final_status_handler_statuses(&ctx);
        let _ = self.status.persist().await;
        self.finish(None).await
    }

    /// Populates `PatchMetadataForHealthStore` when the request asked to be
    /// reported to the health store, mirroring the run's overall result.
    fn set_health_store_substatus(&self, ctx: &OperatorContext) {
        let Some(health_store_id) = self.config.health_store_id.as_deref() else {
            return;
        };
        let any_error = lpe_core::SubstatusName::output_order()
            .iter()
            .any(|name| ctx.status.substatus_status(*name) == Status::Error);
        let status = if any_error { Status::Error } else { Status::Success };
        ctx.status
            .set_patch_metadata_for_health_store_substatus_json(status, Some(health_store_id), env!("CARGO_PKG_VERSION"));
    }

    /// Ensures every substatus whose owner reported an error ends up with a
    /// terminal `Error` status rather than lingering in `Transitioning`.
    fn try_set_final_status_handler_statuses(&self, ctx: &OperatorContext) {
        for name in lpe_core::SubstatusName::output_order() {
            if ctx.status.substatus_status(*name) == Status::Transitioning {
                if ctx.status.substatus_has_errors(*name) {
                    ctx.status.force_substatus_error(*name);
                } else {
                    ctx.status.set_current_operation(operation_owning(*name, self.config.operation));
                }
            }
        }
    }

    async fn finish(&self, fault: Option<OperatorFault>) -> EngineOutcome {
        let action = self.config.operation.as_str();
        match fault {
            Some(OperatorFault::Supersession) => EngineOutcome::Okay,
            Some(OperatorFault::ExitRequested) => {
                let _ = self.lifecycle.mark_complete(self.config.sequence_number, action).await;
                EngineOutcome::CriticalErrorReported
            }
            Some(OperatorFault::RebootRequested) => {
                let _ = self.lifecycle.mark_complete(self.config.sequence_number, action).await;
                EngineOutcome::Okay
            }
            None => {
                let _ = self.lifecycle.mark_complete(self.config.sequence_number, action).await;
                EngineOutcome::Okay
            }
        }
    }
}

fn operation_owning(name: SubstatusName, requested: PatchOperation) -> PatchOperation {
    match name {
        SubstatusName::ConfigurePatchingSummary => PatchOperation::ConfigurePatching,
        SubstatusName::PatchAssessmentSummary => PatchOperation::Assessment,
        SubstatusName::PatchInstallationSummary => PatchOperation::Installation,
        SubstatusName::PatchMetadataForHealthStore => requested,
    }
}

async fn auto_os_patch_state_label(ctx: &OperatorContext) -> &'static str {
    match ctx.package_manager.patch_mode_manager().get_current_auto_os_patch_state().await {
        Ok(lpe_adapters::package_manager::AutoOsPatchState::Disabled) => "Disabled",
        Ok(lpe_adapters::package_manager::AutoOsPatchState::Enabled) => "Enabled",
        _ => "Unknown",
    }
}

fn auto_assessment_state_label(ctx: &OperatorContext) -> &'static str {
    match ctx.config.assessment_mode {
        lpe_core::PlatformMode::AutomaticByPlatform => "Enabled",
        lpe_core::PlatformMode::ImageDefault => "ImageDefault",
    }
}

/// Deletes `*.list` files under `temp_folder`, best-effort (a missing or
/// unreadable temp folder is not fatal).
async fn cleanup_temp_folder(temp_folder: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(temp_folder).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().extension().map(|e| e == "list").unwrap_or(false) {
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
