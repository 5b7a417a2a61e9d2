// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence and reporting: the Telemetry Writer (C), the Status Handler
//! (D), and the CoreState/ExtState/AssessmentState handshake files the
//! engine's Lifecycle Manager drives.

pub mod logger;
pub mod state_files;
pub mod status;
pub mod telemetry;

pub use logger::{CompositeLogger, LogLevel, MAX_AUTO_ASSESSMENT_LOGFILE_SIZE_BYTES};
pub use state_files::{
    AssessmentSequence, AssessmentStateFile, CoreSequence, CoreStateFile, ExtSequence, ExtStateFile, StateFileError,
};
pub use status::{StatusHandler, StatusHandlerError, MAX_COMPLETE_STATUS_FILES_TO_RETAIN, STATUS_ERROR_LIMIT, STATUS_ERROR_MSG_SIZE_LIMIT};
pub use telemetry::{EventInput, EventLevel, TelemetryError, TelemetryWriter};
