// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! File Logger + Composite Logger (B): a rolling log file that additionally
//! tees `WARN`/`ERROR` records into the Telemetry Writer (C).
//!
//! Process-wide structured logging itself is set up once, in `lpe-cli`, via
//! `tracing` + `tracing-appender` (§3 of SPEC_FULL.md); `CompositeLogger` is
//! a separate, narrower component the engine drives directly, appending
//! its own rotating plain-text lines and teeing a handful of
//! operator-significant ones into the Telemetry Writer as events. Per the
//! cyclic-reference design note (§9), the telemetry side is a handle set
//! *after* construction — the logger owns it, the telemetry writer never
//! references the logger back.

use crate::telemetry::{EventInput, EventLevel, TelemetryWriter};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Rolling threshold for the auto-assessment-mode log file
/// (`MAX_AUTO_ASSESSMENT_LOGFILE_SIZE_IN_BYTES`, SPEC_FULL.md §4). The
/// main-mode log has no documented cap and is left unbounded.
pub const MAX_AUTO_ASSESSMENT_LOGFILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    fn to_event_level(self) -> EventLevel {
        match self {
            Self::Debug => EventLevel::Debug,
            Self::Info => EventLevel::Informational,
            Self::Warn => EventLevel::Warning,
            Self::Error => EventLevel::Error,
        }
    }
}

pub struct CompositeLogger {
    log_path: PathBuf,
    rotate_threshold_bytes: Option<u64>,
    telemetry: Mutex<Option<Arc<TelemetryWriter>>>,
}

impl CompositeLogger {
    pub fn new(log_path: impl Into<PathBuf>, rotate_threshold_bytes: Option<u64>) -> Self {
        Self {
            log_path: log_path.into(),
            rotate_threshold_bytes,
            telemetry: Mutex::new(None),
        }
    }

    /// Sets the telemetry handle post-construction (§9 design note).
    pub fn attach_telemetry(&self, writer: Arc<TelemetryWriter>) {
        *self.telemetry.lock() = Some(writer);
    }

    pub async fn log(&self, level: LogLevel, task_name: &str, operation_id: &str, message: &str) -> std::io::Result<()> {
        self.rotate_if_needed().await?;
        self.append_line(level, message).await?;
        if level >= LogLevel::Warn {
            if let Some(writer) = self.telemetry.lock().clone() {
                let input = EventInput {
                    task_name: task_name.to_string(),
                    event_level: level.to_event_level(),
                    message: message.to_string(),
                    operation_id: operation_id.to_string(),
                };
                if let Err(err) = writer.write_event(input).await {
                    tracing::debug!(%err, "telemetry tee failed, continuing with file log only");
                }
            }
        }
        Ok(())
    }

    async fn append_line(&self, level: LogLevel, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        let line = format!(
            "{} [{}] {}\n",
            lpe_adapters::env::now_utc_string(),
            level.as_str(),
            message
        );
        file.write_all(line.as_bytes()).await
    }

    async fn rotate_if_needed(&self) -> std::io::Result<()> {
        let Some(threshold) = self.rotate_threshold_bytes else {
            return Ok(());
        };
        let Ok(metadata) = tokio::fs::metadata(&self.log_path).await else {
            return Ok(());
        };
        if metadata.len() < threshold {
            return Ok(());
        }
        let backup = self.log_path.with_extension("log.1");
        let _ = tokio::fs::remove_file(&backup).await;
        tokio::fs::rename(&self.log_path, &backup).await
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
