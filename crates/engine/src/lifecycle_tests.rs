// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lpe_core::{FakeClock, PatchOperation};
use lpe_storage::{ExtSequence, StatusHandler};
use std::sync::Arc as StdArc;
use tempfile::tempdir;

fn write_ext_state(dir: &Path, number: i64) {
    std::fs::write(
        dir.join("ExtState.json"),
        format!(r#"{{"extensionSequence":{{"number":{number},"operation":"Install"}}}}"#),
    )
    .unwrap();
}

fn core_seq(number: i64, completed: bool, process_ids: Vec<i64>) -> CoreSequence {
    CoreSequence {
        number,
        action: "Install".to_string(),
        completed,
        last_heartbeat: "2026-07-28T00:00:00Z".to_string(),
        process_ids,
        auto_assessment: false,
    }
}

#[test]
fn gate_step_exits_when_sequence_moved_on() {
    let step = evaluate_gate_step(5, 6, None, 0, 100);
    assert_eq!(step, GateStep::ExitSuperseded);
}

#[test]
fn gate_step_proceeds_when_no_core_state_exists() {
    let step = evaluate_gate_step(5, 5, None, 0, 100);
    assert_eq!(step, GateStep::Proceed);
}

#[test]
fn gate_step_proceeds_when_core_state_completed() {
    let core = core_seq(5, true, vec![999]);
    let step = evaluate_gate_step(5, 5, Some(&core), 0, 100);
    assert_eq!(step, GateStep::Proceed);
}

#[test]
fn gate_step_proceeds_when_self_already_owns_it() {
    let core = core_seq(5, false, vec![100]);
    let step = evaluate_gate_step(5, 5, Some(&core), 0, 100);
    assert_eq!(step, GateStep::Proceed);
}

#[test]
fn gate_step_exits_when_core_sequence_belongs_to_a_different_run() {
    // ExtState still shows our sequence number, but CoreState already
    // reflects a newer, unrelated run - the primary gate must key off
    // `core.number`, not the (stale) ext_number.
    let core = core_seq(6, false, vec![777]);
    let step = evaluate_gate_step(5, 5, Some(&core), 0, 100);
    assert_eq!(step, GateStep::ExitSuperseded);
}

#[test]
fn gate_step_exits_when_core_sequence_is_behind_ours() {
    let core = core_seq(4, false, vec![777]);
    let step = evaluate_gate_step(6, 6, Some(&core), 0, 100);
    assert_eq!(step, GateStep::ExitSuperseded);
}

#[test]
fn gate_step_continues_then_times_out_waiting_for_other_owner() {
    let core = core_seq(5, false, vec![200]);
    assert_eq!(evaluate_gate_step(5, 5, Some(&core), 10, 100), GateStep::Continue);
    assert_eq!(
        evaluate_gate_step(5, 5, Some(&core), MAX_AUTO_ASSESSMENT_WAIT_FOR_MAIN_CORE_EXEC_IN_MINUTES + 1, 100),
        GateStep::TimedOut
    );
}

#[test]
fn gate_step_takes_over_after_reboot_buffer_when_no_owner_pids() {
    let core = core_seq(5, false, vec![]);
    assert_eq!(evaluate_gate_step(5, 5, Some(&core), 5, 100), GateStep::Continue);
    assert_eq!(evaluate_gate_step(5, 5, Some(&core), REBOOT_BUFFER_IN_MINUTES + 1, 100), GateStep::Proceed);
}

#[tokio::test]
async fn execution_start_check_proceeds_for_new_sequence() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 3);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(0)));
    assert_eq!(mgr.execution_start_check(4).await.unwrap(), StartDecision::Proceed);
}

#[tokio::test]
async fn execution_start_check_exits_when_already_completed() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 4);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(0)));
    mgr.mark_complete(4, "Install").await.unwrap();
    assert_eq!(mgr.execution_start_check(4).await.unwrap(), StartDecision::ExitOkAlreadyDone);
}

#[tokio::test]
async fn execution_start_check_exits_when_superseded() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 9);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(0)));
    assert_eq!(mgr.execution_start_check(4).await.unwrap(), StartDecision::ExitOkSuperseded);
}

#[tokio::test]
async fn lifecycle_status_check_detects_supersession_and_marks_core_complete() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 4);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(0)));
    mgr.start_run(4, "Install").await.unwrap();
    let status = StatusHandler::new(dir.path(), 4, "activity-1".to_string(), PatchOperation::Installation);

    write_ext_state(dir.path(), 5);
    let outcome = mgr.lifecycle_status_check(4, &status).await.unwrap();
    assert_eq!(outcome, LifecycleStatusOutcome::Superseded);

    let core = mgr.core_state.read().await.unwrap();
    assert!(core.completed);
}

#[tokio::test]
async fn lifecycle_status_check_refreshes_heartbeat_when_current() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 4);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(0)));
    mgr.start_run(4, "Install").await.unwrap();
    let status = StatusHandler::new(dir.path(), 4, "activity-1".to_string(), PatchOperation::Installation);

    let outcome = mgr.lifecycle_status_check(4, &status).await.unwrap();
    assert_eq!(outcome, LifecycleStatusOutcome::Continue);
}

#[tokio::test]
async fn auto_assessment_gate_takes_over_immediately_with_no_prior_core_state() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 7);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(1_000)));
    let status = StatusHandler::new(dir.path(), 7, "activity-2".to_string(), PatchOperation::Assessment);

    let outcome = mgr.execution_start_check_auto_assessment(7, "Assessment", &status).await.unwrap();
    assert_eq!(outcome, AutoAssessmentGateOutcome::TookOver);

    let core = mgr.core_state.read().await.unwrap();
    assert!(core.auto_assessment);
    assert_eq!(core.process_ids, vec![env::current_pid()]);
}

#[tokio::test]
async fn auto_assessment_gate_exits_when_superseded_before_any_wait() {
    let dir = tempdir().unwrap();
    write_ext_state(dir.path(), 7);
    let mgr = LifecycleManager::new(lpe_core::CloudType::Azure, dir.path(), None, StdArc::new(FakeClock::new(0)));
    let status = StatusHandler::new(dir.path(), 2, "activity-3".to_string(), PatchOperation::Assessment);

    let outcome = mgr.execution_start_check_auto_assessment(2, "Assessment", &status).await.unwrap();
    assert_eq!(outcome, AutoAssessmentGateOutcome::ExitOkSuperseded);
}

#[test]
fn ext_sequence_round_trips_through_serde() {
    let ext = ExtSequence {
        number: 1,
        operation: "Install".to_string(),
    };
    assert_eq!(ext.number, 1);
}
