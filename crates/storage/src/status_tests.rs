// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lpe_core::{Classification, PatchState};

fn handler(dir: &std::path::Path) -> StatusHandler {
    StatusHandler::new(dir, 7, "activity-1".to_string(), PatchOperation::Assessment)
}

fn pkg(name: &str, class: Classification, state: PatchState) -> PackageRecord {
    PackageRecord::new(name, "1.0", vec![class], state)
}

#[tokio::test]
async fn assessment_happy_path_writes_success_substatus() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(dir.path());
    h.set_current_operation(PatchOperation::Assessment);
    h.set_configure_patching_substatus_json(Status::Success, "Disabled", "Disabled");
    h.set_patch_assessment_substatus_json(
        Status::Success,
        vec![pkg("openssl", Classification::Security, PatchState::Available)],
        false,
    );
    h.persist().await.unwrap();

    let contents = tokio::fs::read_to_string(dir.path().join("7.status")).await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(doc[0]["status"]["status"], "success");
    let substatus = doc[0]["status"]["substatus"].as_array().unwrap();
    assert_eq!(substatus[0]["name"], "ConfigurePatchingSummary");
    assert_eq!(substatus[1]["name"], "PatchAssessmentSummary");
}

#[tokio::test]
async fn any_error_substatus_makes_top_level_status_error() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(dir.path());
    h.set_patch_assessment_substatus_json(Status::Error, vec![], false);
    h.persist().await.unwrap();
    let contents = tokio::fs::read_to_string(dir.path().join("7.status")).await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(doc[0]["status"]["status"], "error");
}

#[tokio::test]
async fn error_list_is_capped_and_deduplicates_most_recent() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(dir.path());
    h.set_current_operation(PatchOperation::Assessment);
    for i in 0..8 {
        h.add_error(ErrorCode::Error, &format!("boom {i}"), None);
    }
    h.add_error(ErrorCode::Error, "boom 7", None); // duplicate of most recent, suppressed
    h.set_patch_assessment_substatus_json(Status::Error, vec![], false);
    h.persist().await.unwrap();

    let contents = tokio::fs::read_to_string(dir.path().join("7.status")).await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let substatus = doc[0]["status"]["substatus"].as_array().unwrap();
    let message: serde_json::Value =
        serde_json::from_str(substatus[0]["formattedMessage"]["message"].as_str().unwrap()).unwrap();
    let details = message["errors"]["details"].as_array().unwrap();
    assert_eq!(details.len(), STATUS_ERROR_LIMIT);
    assert_eq!(details.last().unwrap()["message"], "boom 7");
}

#[tokio::test]
async fn error_message_truncated_to_limit() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(dir.path());
    h.add_error(ErrorCode::Error, &"x".repeat(500), None);
    h.set_patch_assessment_substatus_json(Status::Error, vec![], false);
    h.persist().await.unwrap();
    let contents = tokio::fs::read_to_string(dir.path().join("7.status")).await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let substatus = doc[0]["status"]["substatus"].as_array().unwrap();
    let message: serde_json::Value =
        serde_json::from_str(substatus[0]["formattedMessage"]["message"].as_str().unwrap()).unwrap();
    let msg = message["errors"]["details"][0]["message"].as_str().unwrap();
    assert_eq!(msg.chars().count(), STATUS_ERROR_MSG_SIZE_LIMIT);
}

#[tokio::test]
async fn truncation_drops_least_important_packages_first() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(dir.path());
    h.set_reporting_target_size(900);
    let mut patches = Vec::new();
    for i in 0..30 {
        patches.push(pkg(&format!("pkg-{i}"), Classification::Unclassified, PatchState::NotSelected));
    }
    patches.push(pkg("critical-fix", Classification::Critical, PatchState::Failed));
    h.set_patch_assessment_substatus_json(Status::Success, patches, false);
    h.persist().await.unwrap();

    let contents = tokio::fs::read_to_string(dir.path().join("7.status")).await.unwrap();
    assert!(contents.chars().count() <= 900 || contents.contains("critical-fix"));
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let substatus = doc[0]["status"]["substatus"].as_array().unwrap();
    let message: serde_json::Value =
        serde_json::from_str(substatus[0]["formattedMessage"]["message"].as_str().unwrap()).unwrap();
    let names: Vec<String> = message["patches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"critical-fix".to_string()), "critical package should survive truncation");
}

#[tokio::test]
async fn load_status_file_components_restores_terminal_status() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(dir.path());
    h.set_patch_assessment_substatus_json(Status::Success, vec![], false);
    h.persist().await.unwrap();

    let h2 = handler(dir.path());
    h2.load_status_file_components().await.unwrap();
    assert_eq!(h2.substatus_status(SubstatusName::PatchAssessmentSummary), Status::Success);
}

#[tokio::test]
async fn retention_keeps_only_the_most_recent_ten_status_files() {
    let dir = tempfile::tempdir().unwrap();
    for seq in 0..15 {
        let h = StatusHandler::new(dir.path(), seq, "a".to_string(), PatchOperation::Assessment);
        h.set_patch_assessment_substatus_json(Status::Success, vec![], false);
        h.persist().await.unwrap();
    }
    let count = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().and_then(|e| e.to_str()) == Some("status"))
        .count();
    assert_eq!(count, MAX_COMPLETE_STATUS_FILES_TO_RETAIN);
}
