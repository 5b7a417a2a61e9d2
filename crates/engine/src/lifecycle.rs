// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle Manager (E): the sequence-number handshake with the wrapper
//! across ExtState/CoreState, including the auto-assessment take-over gate
//! (§4.5, invariant 1, P5, P6).
//!
//! Two cloud-type variants exist (§4.5): Azure and Arc. They differ only in
//! that Arc additionally inspects a sibling extension's `CoreState.json` to
//! avoid running concurrently with the Arc patching path; that sibling path
//! is resolved by the caller (the glob-to-path resolution is an adapter-level
//! concern, not the Lifecycle Manager's) and handed in already resolved.

use crate::maintenance_window::REBOOT_BUFFER_IN_MINUTES;
use lpe_adapters::env;
use lpe_core::{Clock, CloudType, ErrorCode};
use lpe_storage::{AssessmentSequence, AssessmentStateFile, CoreSequence, CoreStateFile, ExtStateFile, StateFileError, StatusHandler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long the auto-assessment gate will poll before giving up (§4.5.2).
pub const MAX_AUTO_ASSESSMENT_WAIT_FOR_MAIN_CORE_EXEC_IN_MINUTES: i64 = 180;
const AUTO_ASSESSMENT_POLL_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    StateFile(#[from] StateFileError),
}

/// Outcome of the non-auto-assessment start check (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    Proceed,
    ExitOkAlreadyDone,
    ExitOkSuperseded,
}

/// Outcome of the auto-assessment gate (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAssessmentGateOutcome {
    TookOver,
    ExitOkSuperseded,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateStep {
    Proceed,
    ExitSuperseded,
    TimedOut,
    Continue,
}

/// Pure decision function for one polling iteration of the auto-assessment
/// gate (§4.5.2 steps 1-4), factored out of the sleeping loop so it can be
/// exercised directly in tests without waiting real minutes.
///
/// The primary mismatch check is against `core.number`, not `ext_number`
/// (mirroring the Python original's `__execution_start_check_auto_assessment`,
/// which gates on `execution_config.sequence_number != core_sequence['number']`
/// and only consults the extension sequence to classify the mismatch for
/// logging). This keeps auto-assessment from waiting on or taking over a
/// CoreState that belongs to a different, unrelated run just because
/// ExtState happened to be momentarily stale.
fn evaluate_gate_step(sequence_number: i64, ext_number: i64, core: Option<&CoreSequence>, elapsed_minutes: i64, self_pid: i64) -> GateStep {
    if let Some(core) = core {
        if core.number != sequence_number {
            if sequence_number < ext_number || sequence_number < core.number {
                tracing::debug!(sequence_number, ext_number, core_number = core.number, "auto-assessment gate exiting: superseded by a newer sequence number");
            } else {
                tracing::debug!(sequence_number, ext_number, core_number = core.number, "auto-assessment gate exiting: sequence-state anomaly detected");
            }
            return GateStep::ExitSuperseded;
        }
    }
    if ext_number != sequence_number {
        return GateStep::ExitSuperseded;
    }
    let Some(core) = core else {
        // No CoreState yet: nothing to take over from, nothing to wait on.
        return GateStep::Proceed;
    };
    if core.completed {
        return GateStep::Proceed;
    }
    if !core.process_ids.is_empty() {
        if core.process_ids.contains(&self_pid) {
            return GateStep::Proceed;
        }
        if elapsed_minutes > MAX_AUTO_ASSESSMENT_WAIT_FOR_MAIN_CORE_EXEC_IN_MINUTES {
            return GateStep::TimedOut;
        }
        return GateStep::Continue;
    }
    if elapsed_minutes > REBOOT_BUFFER_IN_MINUTES {
        GateStep::Proceed
    } else {
        GateStep::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatusOutcome {
    Continue,
    Superseded,
}

pub struct LifecycleManager {
    cloud_type: CloudType,
    config_folder: PathBuf,
    arc_sibling_core_state_path: Option<PathBuf>,
    ext_state: ExtStateFile,
    core_state: CoreStateFile,
    assessment_state: AssessmentStateFile,
    clock: Arc<dyn Clock>,
}

impl LifecycleManager {
    pub fn new(cloud_type: CloudType, config_folder: impl AsRef<Path>, arc_sibling_core_state_path: Option<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let config_folder = config_folder.as_ref().to_path_buf();
        Self {
            cloud_type,
            ext_state: ExtStateFile::new(&config_folder),
            core_state: CoreStateFile::new(&config_folder),
            assessment_state: AssessmentStateFile::new(&config_folder),
            config_folder,
            arc_sibling_core_state_path,
            clock,
        }
    }

    pub fn cloud_type(&self) -> CloudType {
        self.cloud_type
    }

    /// §4.5.1: the non-auto-assessment start check.
    pub async fn execution_start_check(&self, sequence_number: i64) -> Result<StartDecision, LifecycleError> {
        let ext = self.ext_state.read().await?;
        if ext.number < sequence_number {
            return Ok(StartDecision::Proceed);
        }
        if ext.number > sequence_number {
            return Ok(StartDecision::ExitOkSuperseded);
        }
        match self.core_state.read().await {
            Ok(core) if core.completed => Ok(StartDecision::ExitOkAlreadyDone),
            _ => Ok(StartDecision::Proceed),
        }
    }

    /// §4.5.2: the auto-assessment take-over gate. Polls every 30s, up to
    /// `MAX_AUTO_ASSESSMENT_WAIT_FOR_MAIN_CORE_EXEC_IN_MINUTES`. On take-over,
    /// writes CoreState with `completed=false, processIds=[self],
    /// autoAssessment=true` and reloads the status file components so prior
    /// substatus state survives (§4.5.2 final paragraph).
    pub async fn execution_start_check_auto_assessment(
        &self,
        sequence_number: i64,
        action: &str,
        status_handler: &StatusHandler,
    ) -> Result<AutoAssessmentGateOutcome, LifecycleError> {
        let wait_start = self.clock.now_epoch_secs();
        let self_pid = env::current_pid();
        loop {
            let ext = self.ext_state.read().await?;
            if self.cloud_type == CloudType::Arc {
                if let Some(outcome) = self.check_arc_neighbor().await? {
                    return Ok(outcome);
                }
            }
            let core = self.core_state.read().await.ok();
            let elapsed_minutes = (self.clock.now_epoch_secs() - wait_start) / 60;
            match evaluate_gate_step(sequence_number, ext.number, core.as_ref(), elapsed_minutes, self_pid) {
                GateStep::ExitSuperseded => return Ok(AutoAssessmentGateOutcome::ExitOkSuperseded),
                GateStep::TimedOut => return Ok(AutoAssessmentGateOutcome::TimedOut),
                GateStep::Proceed => {
                    self.take_over(sequence_number, action).await?;
                    status_handler.load_status_file_components().await.ok();
                    return Ok(AutoAssessmentGateOutcome::TookOver);
                }
                GateStep::Continue => {
                    tracing::debug!(sequence_number, "auto-assessment gate waiting for main core execution");
                    tokio::time::sleep(Duration::from_secs(AUTO_ASSESSMENT_POLL_SECS)).await;
                }
            }
        }
    }

    /// Arc-only: if a sibling extension's CoreState shows it is actively
    /// (non-completed) running, bow out rather than race it.
    async fn check_arc_neighbor(&self) -> Result<Option<AutoAssessmentGateOutcome>, LifecycleError> {
        let Some(path) = &self.arc_sibling_core_state_path else {
            return Ok(None);
        };
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        let neighbor_state = CoreStateFile::new(parent);
        match neighbor_state.read().await {
            Ok(neighbor) if !neighbor.completed => Ok(Some(AutoAssessmentGateOutcome::ExitOkSuperseded)),
            _ => Ok(None),
        }
    }

    async fn take_over(&self, sequence_number: i64, action: &str) -> Result<(), LifecycleError> {
        let state = CoreSequence {
            number: sequence_number,
            action: action.to_string(),
            completed: false,
            last_heartbeat: env::now_utc_string(),
            process_ids: vec![env::current_pid()],
            auto_assessment: true,
        };
        self.core_state.write(&state).await?;
        Ok(())
    }

    /// Writes the initial CoreState for a fresh (non-take-over) run.
    pub async fn start_run(&self, sequence_number: i64, action: &str) -> Result<(), LifecycleError> {
        let state = CoreSequence {
            number: sequence_number,
            action: action.to_string(),
            completed: false,
            last_heartbeat: env::now_utc_string(),
            process_ids: vec![env::current_pid()],
            auto_assessment: false,
        };
        self.core_state.write(&state).await
    }

    /// §4.5.3: called from long-running operator steps. If the sequence has
    /// moved on, records the supersession fault, marks CoreState complete,
    /// and tells the caller to terminate gracefully; otherwise refreshes the
    /// heartbeat.
    pub async fn lifecycle_status_check(&self, sequence_number: i64, status_handler: &StatusHandler) -> Result<LifecycleStatusOutcome, LifecycleError> {
        let ext = self.ext_state.read().await?;
        if ext.number != sequence_number {
            status_handler.add_error(
                ErrorCode::ClNewerOperationSuperseded,
                "execution superseded by a newer sequence number",
                None,
            );
            if let Ok(mut core) = self.core_state.read().await {
                core.completed = true;
                core.last_heartbeat = env::now_utc_string();
                self.core_state.write(&core).await?;
            }
            return Ok(LifecycleStatusOutcome::Superseded);
        }
        if let Ok(mut core) = self.core_state.read().await {
            core.last_heartbeat = env::now_utc_string();
            self.core_state.write(&core).await?;
        }
        Ok(LifecycleStatusOutcome::Continue)
    }

    /// Marks CoreState complete for a normal (non-superseded) run end.
    pub async fn mark_complete(&self, sequence_number: i64, action: &str) -> Result<(), LifecycleError> {
        let mut core = self
            .core_state
            .read()
            .await
            .unwrap_or(CoreSequence {
                number: sequence_number,
                action: action.to_string(),
                completed: false,
                last_heartbeat: env::now_utc_string(),
                process_ids: vec![env::current_pid()],
                auto_assessment: false,
            });
        core.completed = true;
        core.last_heartbeat = env::now_utc_string();
        self.core_state.write(&core).await
    }

    /// §4.2 Assessment specifics: AssessmentState is persisted *before* the
    /// attempted work, not after, so the next eligibility check is based on
    /// the attempt time rather than completion time.
    pub async fn record_assessment_attempt_start(&self, sequence_number: i64) -> Result<(), LifecycleError> {
        let state = AssessmentSequence {
            number: sequence_number,
            last_start_in_seconds_since_epoch: self.clock.now_epoch_secs(),
            last_heartbeat: env::now_utc_string(),
            process_ids: vec![env::current_pid()],
            auto_assessment: true,
        };
        self.assessment_state.write(&state).await
    }

    pub async fn read_assessment_state(&self) -> Option<AssessmentSequence> {
        self.assessment_state.read().await.ok()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config_folder(&self) -> &Path {
        &self.config_folder
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
