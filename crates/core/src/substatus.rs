// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Substatus naming, per-substatus status levels, and the operation-state
//! record the Status Handler assembles into the status file.

use crate::operation::PatchOperation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed substatus ordering within the status file's `substatus` array.
/// The wrapper keys off name, not position, but a status file writer should
/// always emit in a stable order regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubstatusName {
    ConfigurePatchingSummary,
    PatchAssessmentSummary,
    PatchInstallationSummary,
    PatchMetadataForHealthStore,
}

impl SubstatusName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurePatchingSummary => "ConfigurePatchingSummary",
            Self::PatchAssessmentSummary => "PatchAssessmentSummary",
            Self::PatchInstallationSummary => "PatchInstallationSummary",
            Self::PatchMetadataForHealthStore => "PatchMetadataForHealthStore",
        }
    }

    pub fn for_operation(op: PatchOperation) -> Self {
        match op {
            PatchOperation::Assessment => Self::PatchAssessmentSummary,
            PatchOperation::Installation => Self::PatchInstallationSummary,
            PatchOperation::ConfigurePatching | PatchOperation::ConfigurePatchingAutoAssessment => {
                Self::ConfigurePatchingSummary
            }
        }
    }

    /// The order the status document's substatus array must be emitted in,
    /// independent of insertion order: `ConfigurePatchingSummary`,
    /// `PatchAssessmentSummary`, `PatchInstallationSummary`,
    /// `PatchMetadataForHealthStore`.
    pub fn output_order() -> &'static [SubstatusName] {
        &[
            Self::ConfigurePatchingSummary,
            Self::PatchAssessmentSummary,
            Self::PatchInstallationSummary,
            Self::PatchMetadataForHealthStore,
        ]
    }
}

impl fmt::Display for SubstatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status level reported for a substatus entry.
///
/// `Transitioning` is non-terminal; once a substatus moves to `Success`,
/// `Error`, or `Warning` it must never move back to `Transitioning` or to a
/// different terminal value for the same sequence number (invariant 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Transitioning,
    Success,
    Error,
    Warning,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Transitioning)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transitioning => "transitioning",
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

/// One reported error entry, already clipped to the message-size limit by
/// the caller (the Status Handler owns the clipping policy, this is just
/// the shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusError {
    pub code: String,
    pub message: String,
}

/// In-memory accumulator for a single substatus's worth of state, handed to
/// the Status Handler to be serialized into the substatus envelope.
#[derive(Debug, Clone)]
pub struct OperationState {
    pub name: SubstatusName,
    pub status: Status,
    pub started_by: PatchOperation,
    pub errors: Vec<StatusError>,
}

impl OperationState {
    pub fn new(op: PatchOperation) -> Self {
        Self {
            name: SubstatusName::for_operation(op),
            status: Status::Transitioning,
            started_by: op,
            errors: Vec::new(),
        }
    }

    /// Same as `new`, but keyed directly by substatus name rather than
    /// derived from an operation (used by the Status Handler, which tracks
    /// one record per `SubstatusName` regardless of which operation wrote
    /// it most recently).
    pub fn for_name(name: SubstatusName) -> Self {
        Self {
            name,
            status: Status::Transitioning,
            started_by: match name {
                SubstatusName::ConfigurePatchingSummary => PatchOperation::ConfigurePatching,
                SubstatusName::PatchAssessmentSummary => PatchOperation::Assessment,
                SubstatusName::PatchInstallationSummary => PatchOperation::Installation,
                SubstatusName::PatchMetadataForHealthStore => PatchOperation::ConfigurePatching,
            },
            errors: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Attempts to move to a new status, enforcing that a terminal status
    /// cannot be overwritten (invariant 2 / P1).
    pub fn try_transition(&mut self, next: Status) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                current: self.status,
                attempted: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Resets to a fresh `Transitioning` state, discarding the terminal
    /// guard (used when a substatus is explicitly re-run within the same
    /// process, e.g. Installation's post-install re-assessment, and when
    /// forcing a substatus that must end the run in `Error` regardless of
    /// its current terminal value).
    pub fn reset(&mut self) {
        self.status = Status::Transitioning;
        self.errors.clear();
    }

    /// Bypasses the transition guard entirely, overwriting the status in
    /// place. Used only by the engine's final reconciliation pass, which
    /// must be able to move an already-`Success` substatus to `Error` when
    /// a later stage in the same run determines the overall result must be
    /// terminal `Error` (e.g. Installation succeeding but the mandatory
    /// post-install re-assessment failing).
    pub fn force(&mut self, next: Status) {
        self.status = next;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("substatus already terminal at {current}, cannot move to {attempted}")]
    AlreadyTerminal { current: Status, attempted: Status },
}
