// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `CoreState.json`, `ExtState.json`, and `AssessmentState.json`: the three
//! JSON handshake files the Lifecycle Manager reads and writes (§3.1, §6.4).
//!
//! All reads/writes route through `lpe_adapters::env`, which supplies the
//! retry-with-linear-backoff and atomic temp-file+rename semantics
//! invariant 1 and §4.5.4 require.

use lpe_adapters::env::{self, EnvError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateFileError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize state for {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn bool_string(b: bool) -> String {
    if b { "true".to_string() } else { "false".to_string() }
}

fn parse_bool_string(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}

/// `<configFolder>/ExtState.json`, owned by the wrapper. The core only
/// reads this file; it is never written here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtSequence {
    pub number: i64,
    #[serde(default)]
    pub operation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExtStateWire {
    #[serde(rename = "extensionSequence")]
    extension_sequence: ExtSequence,
}

pub struct ExtStateFile {
    path: PathBuf,
}

impl ExtStateFile {
    pub fn new(config_folder: impl AsRef<Path>) -> Self {
        Self {
            path: config_folder.as_ref().join("ExtState.json"),
        }
    }

    pub async fn read(&self) -> Result<ExtSequence, StateFileError> {
        let contents = env::read_to_string_with_retry(&self.path).await?;
        let wire: ExtStateWire = serde_json::from_str(&contents).map_err(|source| StateFileError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(wire.extension_sequence)
    }
}

/// `<configFolder>/CoreState.json`, owned by the core.
#[derive(Debug, Clone)]
pub struct CoreSequence {
    pub number: i64,
    pub action: String,
    pub completed: bool,
    pub last_heartbeat: String,
    pub process_ids: Vec<i64>,
    pub auto_assessment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoreSequenceWire {
    number: i64,
    action: String,
    completed: String,
    #[serde(rename = "lastHeartbeat")]
    last_heartbeat: String,
    #[serde(rename = "processIds", default)]
    process_ids: Vec<i64>,
    #[serde(rename = "autoAssessment", default)]
    auto_assessment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoreStateWire {
    #[serde(rename = "coreSequence")]
    core_sequence: CoreSequenceWire,
}

impl From<&CoreSequence> for CoreStateWire {
    fn from(v: &CoreSequence) -> Self {
        Self {
            core_sequence: CoreSequenceWire {
                number: v.number,
                action: v.action.clone(),
                completed: bool_string(v.completed),
                last_heartbeat: v.last_heartbeat.clone(),
                process_ids: v.process_ids.clone(),
                auto_assessment: bool_string(v.auto_assessment),
            },
        }
    }
}

impl From<CoreStateWire> for CoreSequence {
    fn from(w: CoreStateWire) -> Self {
        Self {
            number: w.core_sequence.number,
            action: w.core_sequence.action,
            completed: parse_bool_string(&w.core_sequence.completed),
            last_heartbeat: w.core_sequence.last_heartbeat,
            process_ids: w.core_sequence.process_ids,
            auto_assessment: parse_bool_string(&w.core_sequence.auto_assessment),
        }
    }
}

pub struct CoreStateFile {
    path: PathBuf,
}

impl CoreStateFile {
    pub fn new(config_folder: impl AsRef<Path>) -> Self {
        Self {
            path: config_folder.as_ref().join("CoreState.json"),
        }
    }

    pub async fn read(&self) -> Result<CoreSequence, StateFileError> {
        let contents = env::read_to_string_with_retry(&self.path).await?;
        let wire: CoreStateWire = serde_json::from_str(&contents).map_err(|source| StateFileError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(wire.into())
    }

    pub async fn write(&self, state: &CoreSequence) -> Result<(), StateFileError> {
        let wire = CoreStateWire::from(state);
        let contents = serde_json::to_string_pretty(&wire).map_err(|source| StateFileError::Serialize {
            path: self.path.display().to_string(),
            source,
        })?;
        env::write_atomic_with_retry(&self.path, &contents).await?;
        Ok(())
    }
}

/// `<configFolder>/AssessmentState.json`, owned by the auto-assessment path.
#[derive(Debug, Clone)]
pub struct AssessmentSequence {
    pub number: i64,
    pub last_start_in_seconds_since_epoch: i64,
    pub last_heartbeat: String,
    pub process_ids: Vec<i64>,
    pub auto_assessment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssessmentSequenceWire {
    number: i64,
    #[serde(rename = "lastStartInSecondsSinceEpoch")]
    last_start_in_seconds_since_epoch: i64,
    #[serde(rename = "lastHeartbeat")]
    last_heartbeat: String,
    #[serde(rename = "processIds", default)]
    process_ids: Vec<i64>,
    #[serde(rename = "autoAssessment", default)]
    auto_assessment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssessmentStateWire {
    #[serde(rename = "assessmentState")]
    assessment_state: AssessmentSequenceWire,
}

impl From<&AssessmentSequence> for AssessmentStateWire {
    fn from(v: &AssessmentSequence) -> Self {
        Self {
            assessment_state: AssessmentSequenceWire {
                number: v.number,
                last_start_in_seconds_since_epoch: v.last_start_in_seconds_since_epoch,
                last_heartbeat: v.last_heartbeat.clone(),
                process_ids: v.process_ids.clone(),
                auto_assessment: bool_string(v.auto_assessment),
            },
        }
    }
}

impl From<AssessmentStateWire> for AssessmentSequence {
    fn from(w: AssessmentStateWire) -> Self {
        Self {
            number: w.assessment_state.number,
            last_start_in_seconds_since_epoch: w.assessment_state.last_start_in_seconds_since_epoch,
            last_heartbeat: w.assessment_state.last_heartbeat,
            process_ids: w.assessment_state.process_ids,
            auto_assessment: parse_bool_string(&w.assessment_state.auto_assessment),
        }
    }
}

pub struct AssessmentStateFile {
    path: PathBuf,
}

impl AssessmentStateFile {
    pub fn new(config_folder: impl AsRef<Path>) -> Self {
        Self {
            path: config_folder.as_ref().join("AssessmentState.json"),
        }
    }

    pub async fn read(&self) -> Result<AssessmentSequence, StateFileError> {
        let contents = env::read_to_string_with_retry(&self.path).await?;
        let wire: AssessmentStateWire = serde_json::from_str(&contents).map_err(|source| StateFileError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(wire.into())
    }

    pub async fn write(&self, state: &AssessmentSequence) -> Result<(), StateFileError> {
        let wire = AssessmentStateWire::from(state);
        let contents = serde_json::to_string_pretty(&wire).map_err(|source| StateFileError::Serialize {
            path: self.path.display().to_string(),
            source,
        })?;
        env::write_atomic_with_retry(&self.path, &contents).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_files_tests.rs"]
mod tests;
