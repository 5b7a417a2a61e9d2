// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn input(message: &str) -> EventInput {
    EventInput {
        task_name: "Assessment".to_string(),
        event_level: EventLevel::Informational,
        message: message.to_string(),
        operation_id: "activity-1".to_string(),
    }
}

#[tokio::test]
async fn unsupported_when_directory_missing() {
    let writer = TelemetryWriter::new("/no/such/directory", true);
    assert!(!writer.is_supported());
    writer.write_event(input("hello")).await.unwrap();
}

#[tokio::test]
async fn unsupported_when_wrapper_did_not_declare_support() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TelemetryWriter::new(dir.path(), false);
    assert!(!writer.is_supported());
}

#[tokio::test]
async fn writes_one_event_and_appends_tc_token() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TelemetryWriter::new(dir.path(), true);
    writer.write_event(input("hello world")).await.unwrap();

    let mut files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(files.len(), 1);
    let contents = std::fs::read_to_string(files.remove(0).path()).unwrap();
    assert!(contents.contains("hello world [TC=1]"));
}

#[tokio::test]
async fn truncates_oversized_message_and_reports_dropped_count() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TelemetryWriter::new(dir.path(), true);
    let long_message = "x".repeat(10_000);
    writer.write_event(input(&long_message)).await.unwrap();

    let file = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap();
    let contents = std::fs::read_to_string(file.path()).unwrap();
    let events: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    let msg = events[0]["Message"].as_str().unwrap();
    assert!(msg.contains("chars dropped"));
    assert!(msg.contains("[TC=1]"));
}

#[tokio::test]
async fn throttle_notice_is_persisted_as_a_real_event_once_the_window_is_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TelemetryWriter::new(dir.path(), true);
    {
        let mut state = writer.throttle.lock().await;
        state.count = MAX_EVENT_COUNT_THROTTLE - 1;
        state.window_start_epoch = lpe_adapters::env::now_epoch_secs() - (THROTTLE_WINDOW_SECS - 1);
    }

    writer.write_event(input("one more")).await.unwrap();

    let file = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap();
    let contents = std::fs::read_to_string(file.path()).unwrap();
    let events: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    assert_eq!(events.len(), 2);
    let notice = events[0]["Message"].as_str().unwrap();
    assert!(notice.contains("Max telemetry event file limit reached"));
    let actual = events[1]["Message"].as_str().unwrap();
    assert!(actual.contains("one more"));
}

#[tokio::test]
async fn appends_multiple_events_into_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TelemetryWriter::new(dir.path(), true);
    writer.write_event(input("one")).await.unwrap();
    writer.write_event(input("two")).await.unwrap();

    let file = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap();
    let contents = std::fs::read_to_string(file.path()).unwrap();
    let events: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    assert_eq!(events.len(), 2);
}
