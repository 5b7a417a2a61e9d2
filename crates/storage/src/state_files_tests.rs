// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn writes_and_reads_back_core_state() {
    let dir = tempfile::tempdir().unwrap();
    let file = CoreStateFile::new(dir.path());
    let state = CoreSequence {
        number: 7,
        action: "Assessment".to_string(),
        completed: false,
        last_heartbeat: "2026-07-28T00:00:00Z".to_string(),
        process_ids: vec![123],
        auto_assessment: false,
    };
    file.write(&state).await.unwrap();
    let read_back = file.read().await.unwrap();
    assert_eq!(read_back.number, 7);
    assert!(!read_back.completed);
    assert_eq!(read_back.process_ids, vec![123]);
}

#[tokio::test]
async fn completed_flag_round_trips_as_bool_not_string_literal() {
    let dir = tempfile::tempdir().unwrap();
    let file = CoreStateFile::new(dir.path());
    let state = CoreSequence {
        number: 1,
        action: "Installation".to_string(),
        completed: true,
        last_heartbeat: "now".to_string(),
        process_ids: vec![],
        auto_assessment: true,
    };
    file.write(&state).await.unwrap();
    let contents = tokio::fs::read_to_string(dir.path().join("CoreState.json")).await.unwrap();
    assert!(contents.contains("\"completed\": \"true\""));
    let read_back = file.read().await.unwrap();
    assert!(read_back.completed);
    assert!(read_back.auto_assessment);
}

#[tokio::test]
async fn reads_ext_state_written_by_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("ExtState.json"),
        r#"{"extensionSequence":{"number":9,"operation":"Installation"}}"#,
    )
    .await
    .unwrap();
    let ext = ExtStateFile::new(dir.path()).read().await.unwrap();
    assert_eq!(ext.number, 9);
    assert_eq!(ext.operation, "Installation");
}

#[tokio::test]
async fn assessment_state_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let file = AssessmentStateFile::new(dir.path());
    let state = AssessmentSequence {
        number: 3,
        last_start_in_seconds_since_epoch: 1_700_000_000,
        last_heartbeat: "2026-07-28T00:00:00Z".to_string(),
        process_ids: vec![55],
        auto_assessment: true,
    };
    file.write(&state).await.unwrap();
    let read_back = file.read().await.unwrap();
    assert_eq!(read_back.last_start_in_seconds_since_epoch, 1_700_000_000);
    assert_eq!(read_back.process_ids, vec![55]);
}

#[tokio::test]
async fn tolerates_target_path_being_a_stale_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CoreState.json");
    tokio::fs::create_dir_all(&path).await.unwrap();
    let file = CoreStateFile::new(dir.path());
    let state = CoreSequence {
        number: 1,
        action: "Assessment".to_string(),
        completed: false,
        last_heartbeat: "now".to_string(),
        process_ids: vec![1],
        auto_assessment: false,
    };
    file.write(&state).await.unwrap();
    assert!(path.is_file());
}
