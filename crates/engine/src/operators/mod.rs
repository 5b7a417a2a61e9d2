// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Patch Operators (H): the common retryable-unit contract shared by
//! Assessment, Installation, and ConfigurePatching, plus the driver loop
//! that wraps every operator invocation with retry, backoff, lifecycle
//! supersession checks, and a perf-log telemetry event.

pub mod assessment;
pub mod configure_patching;
pub mod installation;

pub use assessment::AssessmentOperator;
pub use configure_patching::ConfigurePatchingOperator;
pub use installation::InstallationOperator;

use crate::fault::OperatorFault;
use crate::lifecycle::{LifecycleManager, LifecycleStatusOutcome};
use async_trait::async_trait;
use lpe_adapters::package_manager::PackageManager;
use lpe_core::{ExecutionConfig, SubstatusName};
use lpe_storage::{StatusHandler, TelemetryWriter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Retry limits per operator, authoritative.
pub const MAX_RETRY_ASSESSMENT: u32 = 5;
pub const MAX_RETRY_INSTALLATION: u32 = 3;
pub const MAX_RETRY_CONFIGURE_PATCHING: u32 = 5;

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error(transparent)]
    Fault(#[from] OperatorFault),
    #[error("{0}")]
    Failed(String),
}

/// The shared dependencies every operator is driven against.
pub struct OperatorContext {
    pub config: Arc<ExecutionConfig>,
    pub status: Arc<StatusHandler>,
    pub telemetry: Arc<TelemetryWriter>,
    pub lifecycle: Arc<LifecycleManager>,
    pub package_manager: Arc<dyn PackageManager>,
}

#[async_trait]
pub trait Operator: Send + Sync {
    fn substatus_name(&self) -> SubstatusName;

    fn max_retry(&self) -> u32;

    /// Gating predicate; a `false` result skips the operator and is treated
    /// as a no-op success.
    async fn should_run(&self, ctx: &OperatorContext) -> bool {
        let _ = ctx;
        true
    }

    async fn start_retryable_unit(&self, ctx: &OperatorContext) -> Result<(), OperatorError>;

    /// Invoked once all retries are exhausted; implementations finalize
    /// their substatus as `Error` here.
    async fn on_terminal_exception(&self, ctx: &OperatorContext, err: &OperatorError);

    /// Extra, operator-specific fields folded into the closing perf-log
    /// event (e.g. a package count). `None` by default; no shipped operator
    /// currently needs one.
    fn perf_log_addenda(&self) -> Option<String> {
        None
    }
}

/// Runs `operator`'s driver loop: should-run gate, retry-with-backoff, a
/// lifecycle status check before every attempt, and a closing perf-log
/// telemetry event. Returns the fault that should end the process, if any.
pub async fn run_with_retries(operator: &dyn Operator, ctx: &OperatorContext) -> Option<OperatorFault> {
    if !operator.should_run(ctx).await {
        return None;
    }

    ctx.status.set_current_operation(ctx.config.operation);
    let sequence_number = ctx.config.sequence_number;
    let max_retry = operator.max_retry().max(1);
    let mut last_err: Option<OperatorError> = None;
    let mut retry_count = 0u32;

    for attempt in 0..max_retry {
        retry_count = attempt;
        match ctx.lifecycle.lifecycle_status_check(sequence_number, &ctx.status).await {
            Ok(LifecycleStatusOutcome::Superseded) => {
                return Some(OperatorFault::Supersession);
            }
            Ok(LifecycleStatusOutcome::Continue) => {}
            Err(_) => {
                // state-file unavailable this round; proceed with the attempt
                // rather than block the operator on a transient read failure.
            }
        }

        match operator.start_retryable_unit(ctx).await {
            Ok(()) => {
                emit_perf_log(ctx, operator, true, retry_count).await;
                return None;
            }
            Err(OperatorError::Fault(fault)) => {
                emit_perf_log(ctx, operator, false, retry_count).await;
                return Some(fault);
            }
            Err(err) => {
                last_err = Some(err);
                if attempt + 1 < max_retry {
                    tokio::time::sleep(Duration::from_secs(2 * (attempt as u64 + 1))).await;
                }
            }
        }
    }

    let err = last_err.unwrap_or_else(|| OperatorError::Failed("retries exhausted".to_string()));
    operator.on_terminal_exception(ctx, &err).await;
    emit_perf_log(ctx, operator, false, retry_count).await;
    None
}

async fn emit_perf_log(ctx: &OperatorContext, operator: &dyn Operator, succeeded: bool, retry_count: u32) {
    let status = ctx.status.substatus_status(operator.substatus_name());
    let mut message = format!(
        "task={} succeeded={succeeded} retryCount={retry_count} status={status} packageManager={} machineInfo={}",
        operator.substatus_name(),
        ctx.package_manager.name(),
        lpe_adapters::env::machine_info(),
    );
    if let Some(addenda) = operator.perf_log_addenda() {
        message.push(' ');
        message.push_str(&addenda);
    }
    let _ = ctx
        .telemetry
        .write_event(lpe_storage::EventInput {
            task_name: operator.substatus_name().to_string(),
            event_level: lpe_storage::EventLevel::Informational,
            message,
            operation_id: ctx.config.activity_id.clone(),
        })
        .await;
}
