// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[tokio::test]
async fn write_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    write_atomic_with_retry(&path, "{\"a\":1}").await.unwrap();
    let contents = read_to_string_with_retry(&path).await.unwrap();
    assert_eq!(contents, "{\"a\":1}");
}

#[tokio::test]
async fn write_replaces_a_stale_directory_at_the_target_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("CoreState.json");
    tokio::fs::create_dir_all(&path).await.unwrap();
    write_atomic_with_retry(&path, "{}").await.unwrap();
    assert!(path.is_file());
}

#[test]
fn now_utc_string_matches_wire_format() {
    let s = now_utc_string();
    assert!(s.ends_with('Z'));
    assert_eq!(s.len(), "2026-07-28T00:00:00Z".len());
}

#[test]
fn pid_zero_is_never_alive() {
    assert!(!pid_is_alive(0));
    assert!(!pid_is_alive(-1));
}

#[test]
fn current_pid_is_alive() {
    assert!(pid_is_alive(current_pid()));
}

#[test]
fn parse_os_release_extracts_name_and_version() {
    let (name, version) = parse_os_release("NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nID=ubuntu\n");
    assert_eq!(name, "Ubuntu");
    assert_eq!(version, "22.04");
}

#[test]
fn parse_os_release_falls_back_when_fields_are_missing() {
    let (name, version) = parse_os_release("");
    assert_eq!(name, "unknown");
    assert_eq!(version, "unknown");
}

#[test]
fn machine_info_includes_the_running_architecture() {
    assert!(machine_info().contains(std::env::consts::ARCH));
}
