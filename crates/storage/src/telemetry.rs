// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry Writer (C): a bounded, throttled event spool under
//! `eventsFolder` (§3.1, §4.4).
//!
//! Every write is atomic (serialize to a temp file, then rename) and the
//! writer degrades to a no-op whenever the events directory is absent or
//! the wrapper did not declare telemetry support (§4.4 availability
//! contract) — callers read `is_supported()` to decide whether
//! Arc-compatibility fallbacks apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Per-message size limit (§4.4); overflow is truncated and annotated.
pub const MSG_SIZE_LIMIT: usize = 3072;
/// Per-event size limit, including every field. Events over this are
/// dropped rather than truncated.
pub const EVENT_SIZE_LIMIT: usize = 6144;
/// Per-file size limit; crossing it starts a new event file.
pub const EVENT_FILE_SIZE_LIMIT: usize = 4_194_304;
/// Total events-directory size limit; crossing it deletes oldest files.
pub const DIR_SIZE_LIMIT: usize = 41_943_040;
/// Throttle: at most this many events per `THROTTLE_WINDOW_SECS`. The gate
/// actually trips one event short of this (`MAX_EVENT_COUNT_THROTTLE - 1`),
/// leaving room to write the throttle notice itself as a real event.
pub const MAX_EVENT_COUNT_THROTTLE: u32 = 72;
pub const THROTTLE_WINDOW_SECS: i64 = 60;

const EVENT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("event exceeds the {EVENT_SIZE_LIMIT}-character per-event limit and was dropped")]
    EventTooLarge,
    #[error("events directory {0} cannot accommodate a new event file even after deleting every existing one")]
    DirectoryCannotShrink(String),
    #[error(transparent)]
    Env(#[from] lpe_adapters::env::EnvError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Informational,
    Warning,
    Error,
    Debug,
}

impl EventLevel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "Informational",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Debug => "Debug",
        }
    }
}

/// What a caller supplies for one telemetry event; the writer fills in the
/// process-wide fields (version, timestamp, pid/tid, truncation, TC token).
#[derive(Debug, Clone)]
pub struct EventInput {
    pub task_name: String,
    pub event_level: EventLevel,
    pub message: String,
    pub operation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventRecord {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TaskName")]
    task_name: String,
    #[serde(rename = "EventLevel")]
    event_level: String,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "EventPid")]
    event_pid: i64,
    #[serde(rename = "EventTid")]
    event_tid: i64,
    #[serde(rename = "OperationId")]
    operation_id: String,
}

struct ThrottleState {
    count: u32,
    window_start_epoch: i64,
}

/// The per-process telemetry-message counter used to produce the `[TC=<n>]`
/// debugging token (§9: the one genuine process-global, scoped here to the
/// writer instance rather than left as a bare global).
pub struct TelemetryWriter {
    events_dir: PathBuf,
    supported: bool,
    message_counter: AtomicU64,
    throttle: Mutex<ThrottleState>,
    current_file: Mutex<Option<PathBuf>>,
}

impl TelemetryWriter {
    /// Constructs the writer. Support is `false` (no-op mode) unless the
    /// wrapper declared `telemetrySupported` *and* the directory exists.
    pub fn new(events_folder: impl AsRef<Path>, telemetry_supported: bool) -> Self {
        let events_dir = events_folder.as_ref().to_path_buf();
        let supported = telemetry_supported && events_dir.is_dir();
        Self {
            events_dir,
            supported,
            message_counter: AtomicU64::new(0),
            throttle: Mutex::new(ThrottleState {
                count: 0,
                window_start_epoch: lpe_adapters::env::now_epoch_secs(),
            }),
            current_file: Mutex::new(None),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Writes one event, applying truncation (§4.4), throttling, file
    /// rotation, and directory-size eviction in that order. A no-op
    /// `Ok(())` when the writer is unsupported.
    pub async fn write_event(&self, input: EventInput) -> Result<(), TelemetryError> {
        self.write_event_impl(input, true).await
    }

    async fn write_event_impl(&self, input: EventInput, apply_throttling: bool) -> Result<(), TelemetryError> {
        if !self.supported {
            return Ok(());
        }

        if apply_throttling {
            self.apply_throttle().await;
        }

        let tc = self.message_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let message = truncate_message(&input.message, tc);

        let record = EventRecord {
            version: EVENT_VERSION.to_string(),
            timestamp: lpe_adapters::env::now_utc_string(),
            task_name: input.task_name,
            event_level: input.event_level.as_str().to_string(),
            message,
            event_pid: lpe_adapters::env::current_pid(),
            event_tid: lpe_adapters::env::current_pid(),
            operation_id: input.operation_id,
        };

        let serialized = serde_json::to_string(&record)?;
        if serialized.len() > EVENT_SIZE_LIMIT {
            return Err(TelemetryError::EventTooLarge);
        }

        self.append_to_spool(record).await
    }

    /// Caps the event rate at `MAX_EVENT_COUNT_THROTTLE` per
    /// `THROTTLE_WINDOW_SECS`, checking one event short of the cap so there
    /// is always room left to write the throttle notice itself. When the
    /// window is exhausted, persists the notice as a real event (with the
    /// recursion guard `write_event_impl`'s `apply_throttling = false` gives
    /// it) before sleeping out the remainder of the window.
    async fn apply_throttle(&self) {
        let now = lpe_adapters::env::now_epoch_secs();
        let remaining = {
            let mut state = self.throttle.lock().await;
            if now - state.window_start_epoch >= THROTTLE_WINDOW_SECS {
                state.count = 1;
                state.window_start_epoch = now;
                None
            } else if state.count >= MAX_EVENT_COUNT_THROTTLE - 1 {
                Some(THROTTLE_WINDOW_SECS - (now - state.window_start_epoch))
            } else {
                state.count += 1;
                None
            }
        };

        let Some(remaining) = remaining else { return };
        let remaining = remaining.max(0);

        tracing::warn!(wait_secs = remaining, "telemetry event rate throttled, pausing for remainder of window");
        let notice = format!(
            "Max telemetry event file limit reached. Extension will wait until a telemetry event file can be written again. [WaitTimeInSecs={remaining}]"
        );
        let _ = self
            .write_event_impl(
                EventInput {
                    task_name: "TelemetryWriter".to_string(),
                    event_level: EventLevel::Informational,
                    message: notice,
                    operation_id: String::new(),
                },
                false,
            )
            .await;

        if remaining > 0 {
            tokio::time::sleep(Duration::from_secs(remaining as u64)).await;
        }

        let mut state = self.throttle.lock().await;
        state.count = 1;
        state.window_start_epoch = lpe_adapters::env::now_epoch_secs();
    }

    async fn append_to_spool(&self, record: EventRecord) -> Result<(), TelemetryError> {
        let mut current = self.current_file.lock().await;
        let mut path = match current.clone() {
            Some(p) if p.is_file() => p,
            _ => self.new_event_file_path().await,
        };

        let mut events = read_events(&path).await.unwrap_or_default();
        events.push(record.clone());
        let mut serialized = serde_json::to_string(&events)?;

        if serialized.len() > EVENT_FILE_SIZE_LIMIT {
            // The existing file is full; wait a second to guarantee a
            // distinct monotonic-ms filename, then retry against a fresh file.
            tokio::time::sleep(Duration::from_secs(1)).await;
            path = self.new_event_file_path().await;
            events = vec![record];
            serialized = serde_json::to_string(&events)?;
        }

        self.make_room_for(&path, serialized.len()).await?;
        lpe_adapters::env::write_atomic_with_retry(&path, &serialized).await?;
        *current = Some(path);
        Ok(())
    }

    async fn new_event_file_path(&self) -> PathBuf {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        self.events_dir.join(format!("{millis}.json"))
    }

    /// Evicts oldest event files until the directory has room for
    /// `incoming_size` more characters, raising if it still doesn't fit
    /// after every other file has been removed (§3.3 invariant 5).
    async fn make_room_for(&self, target: &Path, incoming_size: usize) -> Result<(), TelemetryError> {
        loop {
            let existing_total = directory_size_excluding(&self.events_dir, target).await?;
            if existing_total + incoming_size <= DIR_SIZE_LIMIT {
                return Ok(());
            }
            let Some(oldest) = oldest_event_file(&self.events_dir, target).await? else {
                return Err(TelemetryError::DirectoryCannotShrink(self.events_dir.display().to_string()));
            };
            let _ = tokio::fs::remove_file(&oldest).await;
        }
    }
}

fn truncate_message(message: &str, tc: u64) -> String {
    if message.chars().count() <= MSG_SIZE_LIMIT {
        return format!("{message} [TC={tc}]");
    }
    let kept: String = message.chars().take(MSG_SIZE_LIMIT).collect();
    let dropped = message.chars().count() - MSG_SIZE_LIMIT;
    format!("{kept}. [{dropped} chars dropped] [TC={tc}]")
}

async fn read_events(path: &Path) -> Option<Vec<EventRecord>> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&contents).ok()
}

async fn directory_size_excluding(dir: &Path, exclude: &Path) -> Result<usize, TelemetryError> {
    let mut total = 0usize;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == exclude {
            continue;
        }
        if let Ok(metadata) = entry.metadata().await {
            total += metadata.len() as usize;
        }
    }
    Ok(total)
}

async fn oldest_event_file(dir: &Path, exclude: &Path) -> Result<Option<PathBuf>, TelemetryError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut oldest: Option<(std::time::SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == exclude || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if oldest.as_ref().map(|(t, _)| modified < *t).unwrap_or(true) {
            oldest = Some((modified, path));
        }
    }
    Ok(oldest.map(|(_, p)| p))
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
