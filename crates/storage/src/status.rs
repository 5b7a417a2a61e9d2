// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Status Handler (D): assembles the single `<statusFolder>/<seq>.status`
//! document (§6.2), enforcing substatus ordering (§4.3), the bounded/
//! deduplicated error list, and size-bounded truncation (invariant 4, P3).

use lpe_adapters::env;
use lpe_core::{Classification, ErrorCode, OperationState, PackageRecord, PatchOperation, PatchState, Status, SubstatusName};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

/// At most this many error entries are kept per substatus (§4.3).
pub const STATUS_ERROR_LIMIT: usize = 5;
/// Each error message is clipped to this many characters (§4.3).
pub const STATUS_ERROR_MSG_SIZE_LIMIT: usize = 128;
/// Historical `.status` files retained in the status folder (§4.3).
pub const MAX_COMPLETE_STATUS_FILES_TO_RETAIN: usize = 10;
/// Default status-file character budget if the caller never overrides it.
pub const DEFAULT_REPORTING_TARGET_SIZE: usize = 126_976;

#[derive(Debug, Error)]
pub enum StatusHandlerError {
    #[error(transparent)]
    Env(#[from] env::EnvError),
    #[error("failed to serialize status document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
struct ErrorEntry {
    code: ErrorCode,
    message: String,
}

#[derive(Debug, Clone)]
struct SubstatusRecord {
    state: OperationState,
    activity_id: String,
    start_time: String,
    errors: Vec<ErrorEntry>,
    patches: Vec<PackageRecord>,
    extra: serde_json::Map<String, Value>,
}

impl SubstatusRecord {
    fn new(name: SubstatusName) -> Self {
        Self {
            state: OperationState::for_name(name),
            activity_id: String::new(),
            start_time: String::new(),
            errors: Vec::new(),
            patches: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    fn status(&self) -> Status {
        self.state.status()
    }

    /// Applies the transition through `OperationState::try_transition`
    /// (invariant 2 / P1). A rejected transition (attempting to move a
    /// terminal substatus anywhere but where it already is) is logged and
    /// otherwise ignored, since every caller of `set_*_substatus_json` is
    /// infallible by design.
    fn apply_status(&mut self, next: Status) {
        if let Err(err) = self.state.try_transition(next) {
            tracing::warn!(substatus = %self.state.name, %err, "rejected illegal substatus transition");
        }
    }

    fn reset(&mut self) {
        let name = self.state.name;
        *self = Self::new(name);
    }
}

struct Inner {
    sequence_number: i64,
    activity_id: String,
    requested_operation: PatchOperation,
    current_operation: PatchOperation,
    reporting_target_size: usize,
    records: [SubstatusRecord; 4],
    log_path: Option<String>,
}

fn slot(name: SubstatusName) -> usize {
    match name {
        SubstatusName::ConfigurePatchingSummary => 0,
        SubstatusName::PatchAssessmentSummary => 1,
        SubstatusName::PatchInstallationSummary => 2,
        SubstatusName::PatchMetadataForHealthStore => 3,
    }
}

/// Structured `.status` file writer, one instance per process run.
pub struct StatusHandler {
    status_folder: PathBuf,
    inner: Mutex<Inner>,
}

impl StatusHandler {
    pub fn new(status_folder: impl Into<PathBuf>, sequence_number: i64, activity_id: String, requested_operation: PatchOperation) -> Self {
        Self {
            status_folder: status_folder.into(),
            inner: Mutex::new(Inner {
                sequence_number,
                activity_id,
                requested_operation,
                current_operation: requested_operation,
                reporting_target_size: DEFAULT_REPORTING_TARGET_SIZE,
                records: [
                    SubstatusRecord::new(SubstatusName::ConfigurePatchingSummary),
                    SubstatusRecord::new(SubstatusName::PatchAssessmentSummary),
                    SubstatusRecord::new(SubstatusName::PatchInstallationSummary),
                    SubstatusRecord::new(SubstatusName::PatchMetadataForHealthStore),
                ],
                log_path: None,
            }),
        }
    }

    pub fn set_log_path(&self, path: impl Into<String>) {
        self.inner.lock().log_path = Some(path.into());
    }

    pub fn set_reporting_target_size(&self, max_characters: usize) {
        self.inner.lock().reporting_target_size = max_characters;
    }

    /// Selects which substatus subsequent `add_error` calls target by
    /// default.
    pub fn set_current_operation(&self, op: PatchOperation) {
        self.inner.lock().current_operation = op;
    }

    fn set_substatus(&self, name: SubstatusName, status: Status, patches: Vec<PackageRecord>, extra: serde_json::Map<String, Value>) {
        let mut inner = self.inner.lock();
        let activity_id = inner.activity_id.clone();
        let rec = &mut inner.records[slot(name)];
        if rec.activity_id.is_empty() {
            rec.activity_id = activity_id;
        }
        if rec.start_time.is_empty() {
            rec.start_time = env::now_utc_string();
        }
        rec.apply_status(status);
        rec.patches = patches;
        rec.extra = extra;
    }

    pub fn set_configure_patching_substatus_json(&self, status: Status, auto_os_patch_state: &str, auto_assessment_state: &str) {
        let extra = json_map(json!({
            "automaticOSPatchState": auto_os_patch_state,
            "autoAssessmentStatus": { "autoAssessmentState": auto_assessment_state },
        }));
        self.set_substatus(SubstatusName::ConfigurePatchingSummary, status, Vec::new(), extra);
    }

    pub fn set_patch_assessment_substatus_json(&self, status: Status, patches: Vec<PackageRecord>, reboot_pending: bool) {
        let critical_and_security = patches
            .iter()
            .filter(|p| matches!(p.primary_classification(), Classification::Critical | Classification::Security))
            .count();
        let extra = json_map(json!({
            "rebootPending": reboot_pending,
            "criticalAndSecurityPatchCount": critical_and_security,
            "otherPatchCount": patches.len() - critical_and_security,
        }));
        self.set_substatus(SubstatusName::PatchAssessmentSummary, status, patches, extra);
    }

    pub fn set_patch_installation_substatus_json(
        &self,
        status: Status,
        patches: Vec<PackageRecord>,
        maintenance_window_exceeded: bool,
        maintenance_run_id: Option<&str>,
    ) {
        let counts = count_by_state(&patches);
        let extra = json_map(json!({
            "maintenanceWindowExceeded": maintenance_window_exceeded,
            "maintenanceRunId": maintenance_run_id,
            "notSelectedPatchCount": counts.not_selected,
            "excludedPatchCount": counts.excluded,
            "pendingPatchCount": counts.pending,
            "installedPatchCount": counts.installed,
            "failedPatchCount": counts.failed,
        }));
        self.set_substatus(SubstatusName::PatchInstallationSummary, status, patches, extra);
    }

    pub fn set_patch_metadata_for_health_store_substatus_json(&self, status: Status, health_store_id: Option<&str>, patch_version: &str) {
        let extra = json_map(json!({
            "patchVersion": patch_version,
            "shouldReportToHealthStore": health_store_id.is_some(),
        }));
        self.set_substatus(SubstatusName::PatchMetadataForHealthStore, status, Vec::new(), extra);
    }

    /// Clears a substatus's accumulated state so Assessment can be
    /// re-invoked within the same run (Installation's post-install
    /// re-assessment, §4.2).
    pub fn reset_substatus(&self, name: SubstatusName) {
        self.inner.lock().records[slot(name)].reset();
    }

    pub fn substatus_status(&self, name: SubstatusName) -> Status {
        self.inner.lock().records[slot(name)].status()
    }

    /// Whether `name` has at least one recorded error entry.
    pub fn substatus_has_errors(&self, name: SubstatusName) -> bool {
        !self.inner.lock().records[slot(name)].errors.is_empty()
    }

    /// Forces `name`'s status to `Error` in place, leaving its payload and
    /// extra fields untouched. Used to finalize a substatus whose owning
    /// operator already reported success but a later stage in the same run
    /// determined the overall result must be terminal `Error`.
    pub fn force_substatus_error(&self, name: SubstatusName) {
        self.inner.lock().records[slot(name)].state.force(Status::Error);
    }

    /// Pushes an error, truncating the message and suppressing an
    /// immediate duplicate of the most-recent entry (§4.3).
    pub fn add_error(&self, code: ErrorCode, message: &str, operation_override: Option<PatchOperation>) {
        let mut inner = self.inner.lock();
        let op = operation_override.unwrap_or(inner.current_operation);
        let name = SubstatusName::for_operation(op);
        let truncated: String = message.chars().take(STATUS_ERROR_MSG_SIZE_LIMIT).collect();
        let rec = &mut inner.records[slot(name)];
        if let Some(last) = rec.errors.last() {
            if last.code == code && last.message == truncated {
                return;
            }
        }
        rec.errors.push(ErrorEntry { code, message: truncated });
        if rec.errors.len() > STATUS_ERROR_LIMIT {
            rec.errors.remove(0);
        }
    }

    /// Re-reads the on-disk status file for this sequence number and
    /// restores in-memory substatus state, so an auto-assessment take-over
    /// (§4.5.2) starts from what the prior process had already reported
    /// rather than a blank slate.
    pub async fn load_status_file_components(&self) -> Result<(), StatusHandlerError> {
        let path = self.status_file_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(_) => return Ok(()),
        };
        let Ok(doc) = serde_json::from_str::<Value>(&contents) else {
            return Ok(());
        };
        let Some(entry) = doc.as_array().and_then(|a| a.first()) else {
            return Ok(());
        };
        let Some(substatus_array) = entry["status"]["substatus"].as_array() else {
            return Ok(());
        };
        let mut inner = self.inner.lock();
        for item in substatus_array {
            let Some(name_str) = item["name"].as_str() else { continue };
            let name = match name_str {
                "ConfigurePatchingSummary" => SubstatusName::ConfigurePatchingSummary,
                "PatchAssessmentSummary" => SubstatusName::PatchAssessmentSummary,
                "PatchInstallationSummary" => SubstatusName::PatchInstallationSummary,
                "PatchMetadataForHealthStore" => SubstatusName::PatchMetadataForHealthStore,
                _ => continue,
            };
            let Some(status_str) = item["status"].as_str() else { continue };
            let status = match status_str {
                "success" => Status::Success,
                "error" => Status::Error,
                "warning" => Status::Warning,
                _ => Status::Transitioning,
            };
            // Rehydrating from disk after a process restart establishes the
            // baseline state rather than transitioning through it, so this
            // bypasses the terminal guard like `force_substatus_error` does.
            inner.records[slot(name)].state.force(status);
        }
        Ok(())
    }

    fn status_file_path(&self) -> PathBuf {
        let seq = self.inner.lock().sequence_number;
        self.status_folder.join(format!("{seq}.status"))
    }

    /// Whether every present substatus that is terminal has reached
    /// `Success`; used by the top-level `status.status` rollup (§7.3: the
    /// top level is `success` unless any contained substatus is not).
    fn top_level_status(inner: &Inner) -> Status {
        let any_error = inner.records.iter().any(|r| r.status() == Status::Error);
        let any_warning = inner.records.iter().any(|r| r.status() == Status::Warning);
        let any_transitioning = inner.records.iter().any(|r| r.status() == Status::Transitioning);
        if any_error {
            Status::Error
        } else if any_transitioning {
            Status::Transitioning
        } else if any_warning {
            Status::Warning
        } else {
            Status::Success
        }
    }

    /// Serializes the current state, truncating packages per the
    /// classification×state drop order (§4.3) until it fits
    /// `reporting_target_size`, then writes it atomically and enforces the
    /// retention cap (§4.3).
    pub async fn persist(&self) -> Result<(), StatusHandlerError> {
        let (serialized, _dropped) = {
            let inner = self.inner.lock();
            build_document(&inner)
        };
        let path = self.status_file_path();
        env::write_atomic_with_retry(&path, &serialized).await?;
        enforce_retention(&self.status_folder).await?;
        Ok(())
    }
}

#[derive(Default)]
struct StateCounts {
    not_selected: usize,
    excluded: usize,
    pending: usize,
    installed: usize,
    failed: usize,
}

fn count_by_state(patches: &[PackageRecord]) -> StateCounts {
    let mut counts = StateCounts::default();
    for p in patches {
        match p.patch_state {
            PatchState::NotSelected => counts.not_selected += 1,
            PatchState::Excluded => counts.excluded += 1,
            PatchState::Pending => counts.pending += 1,
            PatchState::Installed => counts.installed += 1,
            PatchState::Failed => counts.failed += 1,
            PatchState::Available => {}
        }
    }
    counts
}

fn json_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Pops the globally least-important package (by the classification×state
/// drop order, §4.3) from whichever of the two droppable lists holds it.
/// Returns `false` once both are empty.
fn drop_least_important(assessment: &mut Vec<PackageRecord>, installation: &mut Vec<PackageRecord>) -> bool {
    lpe_core::sort_for_truncation(assessment);
    lpe_core::sort_for_truncation(installation);
    let key = |p: &PackageRecord| (p.primary_classification().drop_priority(), p.patch_state.drop_priority());
    let a_key = assessment.last().map(key);
    let i_key = installation.last().map(key);
    match (a_key, i_key) {
        (None, None) => false,
        (Some(_), None) => {
            assessment.pop();
            true
        }
        (None, Some(_)) => {
            installation.pop();
            true
        }
        (Some(ak), Some(ik)) => {
            if ak >= ik {
                assessment.pop();
            } else {
                installation.pop();
            }
            true
        }
    }
}

fn assemble(inner: &Inner, assessment_patches: &[PackageRecord], installation_patches: &[PackageRecord], dropped: usize) -> Value {
    let mut substatus_array = Vec::new();
    for name in SubstatusName::output_order() {
        let rec = &inner.records[slot(*name)];
        if rec.activity_id.is_empty() && rec.errors.is_empty() {
            continue;
        }
        let patches = match name {
            SubstatusName::PatchAssessmentSummary => assessment_patches,
            SubstatusName::PatchInstallationSummary => installation_patches,
            _ => &[],
        };
        let dropped_count = match name {
            SubstatusName::PatchAssessmentSummary | SubstatusName::PatchInstallationSummary => Some(dropped),
            _ => None,
        };
        substatus_array.push(substatus_envelope(*name, rec, patches, inner.log_path.as_deref(), dropped_count));
    }

    json!({
        "version": 1.0,
        "timestampUTC": env::now_utc_string(),
        "status": {
            "name": "Azure Patch Management",
            "operation": inner.requested_operation.as_str(),
            "status": top_level_status_str(inner),
            "code": 0,
            "formattedMessage": { "lang": "en-US", "message": "" },
            "substatus": substatus_array,
        }
    })
}

fn top_level_status_str(inner: &Inner) -> &'static str {
    status_str(StatusHandler::top_level_status(inner))
}

fn substatus_envelope(
    name: SubstatusName,
    rec: &SubstatusRecord,
    patches: &[PackageRecord],
    log_path: Option<&str>,
    dropped_count: Option<usize>,
) -> Value {
    let errors_count = rec.errors.len();
    let error_code = if rec.errors.is_empty() { 0 } else { 1 };
    let details: Vec<Value> = rec
        .errors
        .iter()
        .map(|e| json!({ "code": e.code.as_str(), "message": e.message }))
        .collect();

    let mut body = serde_json::Map::new();
    body.insert("activityId".to_string(), json!(rec.activity_id));
    body.insert("startTime".to_string(), json!(rec.start_time));
    body.insert("lastModifiedTime".to_string(), json!(env::now_utc_string()));
    body.insert(
        "errors".to_string(),
        json!({
            "code": error_code,
            "count": errors_count,
            "details": details,
            "logFilePath": log_path,
        }),
    );
    if !patches.is_empty() || matches!(name, SubstatusName::PatchAssessmentSummary | SubstatusName::PatchInstallationSummary) {
        body.insert(
            "patches".to_string(),
            json!(patches
                .iter()
                .map(|p| json!({
                    "patchId": p.name,
                    "name": p.name,
                    "version": p.version,
                    "classifications": p.classifications.iter().map(Classification::as_str).collect::<Vec<_>>(),
                    "patchInstallationState": p.patch_state.as_str(),
                }))
                .collect::<Vec<_>>()),
        );
    }
    for (k, v) in &rec.extra {
        body.insert(k.clone(), v.clone());
    }
    if let Some(dropped) = dropped_count {
        body.insert("droppedPatchCount".to_string(), json!(dropped));
    }

    let message = serde_json::to_string(&Value::Object(body)).unwrap_or_default();
    json!({
        "name": name.as_str(),
        "status": status_str(rec.status()),
        "code": 0,
        "formattedMessage": { "lang": "en-US", "message": message },
    })
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Transitioning => "transitioning",
        Status::Success => "success",
        Status::Error => "error",
        Status::Warning => "warning",
    }
}

/// Builds the final serialized document, truncating packages until it fits
/// `reporting_target_size`, returning the serialized text and how many
/// packages were dropped.
fn build_document(inner: &Inner) -> (String, usize) {
    let mut assessment_patches = inner.records[slot(SubstatusName::PatchAssessmentSummary)].patches.clone();
    let mut installation_patches = inner.records[slot(SubstatusName::PatchInstallationSummary)].patches.clone();
    let mut dropped = 0usize;
    loop {
        let doc = assemble(inner, &assessment_patches, &installation_patches, dropped);
        let serialized = serde_json::to_string_pretty(&doc).unwrap_or_default();
        if serialized.chars().count() <= inner.reporting_target_size {
            return (serialized, dropped);
        }
        if !drop_least_important(&mut assessment_patches, &mut installation_patches) {
            return (serialized, dropped);
        }
        dropped += 1;
    }
}

async fn enforce_retention(status_folder: &std::path::Path) -> Result<(), StatusHandlerError> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(status_folder).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("status") {
            continue;
        }
        if let Ok(metadata) = entry.metadata().await {
            if let Ok(modified) = metadata.modified() {
                entries.push((modified, path));
            }
        }
    }
    if entries.len() <= MAX_COMPLETE_STATUS_FILES_TO_RETAIN {
        return Ok(());
    }
    entries.sort_by_key(|(modified, _)| *modified);
    let excess = entries.len() - MAX_COMPLETE_STATUS_FILES_TO_RETAIN;
    for (_, path) in entries.into_iter().take(excess) {
        let _ = tokio::fs::remove_file(path).await;
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
