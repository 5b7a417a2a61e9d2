// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::operators::configure_patching::AUTO_ASSESSMENT_UNIT_NAME;
use lpe_adapters::fake::FakePackageManager;
use lpe_adapters::package_manager::AvailablePackage;
use lpe_adapters::systemd::SystemdUnitManager;
use lpe_core::{CloudType, FakeClock, Iso8601Duration, PlatformMode, RebootSetting};
use lpe_storage::CoreStateFile;
use std::sync::Arc as StdArc;
use tempfile::tempdir;

const SEQUENCE_NUMBER: i64 = 42;

fn config(operation: PatchOperation) -> ExecutionConfig {
    ExecutionConfig {
        sequence_number: SEQUENCE_NUMBER,
        activity_id: "activity-engine".to_string(),
        cloud_type: Some(CloudType::Azure),
        operation,
        start_time: "2026-07-28T00:00:00Z".to_string(),
        maximum_duration: Iso8601Duration::from_seconds(3600),
        reboot_setting: RebootSetting::Never,
        classifications_to_include: vec![],
        patches_to_include: vec![],
        patches_to_exclude: vec![],
        maintenance_run_id: None,
        health_store_id: None,
        patch_mode: PlatformMode::ImageDefault,
        assessment_mode: PlatformMode::ImageDefault,
        maximum_assessment_interval: Some(Iso8601Duration::from_seconds(3600)),
        exec_auto_assess_only: false,
    }
}

fn engine(dir: &std::path::Path, cfg: ExecutionConfig, pm: FakePackageManager) -> CoreExecutionEngine {
    let config = Arc::new(cfg);
    let lifecycle = Arc::new(LifecycleManager::new(CloudType::Azure, dir, None, StdArc::new(FakeClock::new(0))));
    CoreExecutionEngine {
        status: Arc::new(StatusHandler::new(dir, config.sequence_number, config.activity_id.clone(), config.operation)),
        telemetry: Arc::new(TelemetryWriter::new(dir.join("events"), false)),
        lifecycle,
        package_manager: Arc::new(pm),
        configure_patching: ConfigurePatchingOperator {
            systemd: SystemdUnitManager::new(AUTO_ASSESSMENT_UNIT_NAME),
            auto_os_patch_backup_path: dir.join("ImageDefaultPatchConfiguration.bak"),
            exec_start_command: "/usr/bin/azgps-lpe-core -autoAssessOnly".to_string(),
        },
        env: lpe_core::EnvironmentSettings {
            log_folder: dir.join("log").to_string_lossy().to_string(),
            config_folder: dir.to_string_lossy().to_string(),
            status_folder: dir.to_string_lossy().to_string(),
            events_folder: dir.join("events").to_string_lossy().to_string(),
            temp_folder: dir.join("temp").to_string_lossy().to_string(),
            telemetry_supported: false,
        },
        config,
        telemetry_agent_version: None,
    }
}

/// Seeds `ExtState.json` at the engine's sequence number and writes an
/// initial `CoreState.json` via `start_run`, mirroring what
/// `CoreExecutionEngine::run` does before handing off to the pipeline so
/// the handshake reads in the pipeline hit an existing file on the first
/// try instead of exhausting the retry-with-backoff path on a missing one.
async fn seed_handshake(dir: &std::path::Path, engine: &CoreExecutionEngine) {
    tokio::fs::write(
        dir.join("ExtState.json"),
        format!(r#"{{"extensionSequence":{{"number":{SEQUENCE_NUMBER},"operation":"Install"}}}}"#),
    )
    .await
    .unwrap();
    engine.lifecycle.start_run(SEQUENCE_NUMBER, engine.config.operation.as_str()).await.unwrap();
}

#[test]
fn operation_owning_maps_fixed_substatuses_regardless_of_requested_operation() {
    for requested in [PatchOperation::Assessment, PatchOperation::Installation, PatchOperation::ConfigurePatching] {
        assert_eq!(operation_owning(SubstatusName::ConfigurePatchingSummary, requested), PatchOperation::ConfigurePatching);
        assert_eq!(operation_owning(SubstatusName::PatchAssessmentSummary, requested), PatchOperation::Assessment);
        assert_eq!(operation_owning(SubstatusName::PatchInstallationSummary, requested), PatchOperation::Installation);
    }
}

#[test]
fn operation_owning_health_store_follows_the_requested_operation() {
    assert_eq!(
        operation_owning(SubstatusName::PatchMetadataForHealthStore, PatchOperation::Installation),
        PatchOperation::Installation
    );
    assert_eq!(
        operation_owning(SubstatusName::PatchMetadataForHealthStore, PatchOperation::Assessment),
        PatchOperation::Assessment
    );
}

#[tokio::test]
async fn cleanup_temp_folder_removes_only_list_files() {
    let dir = tempdir().unwrap();
    let temp = dir.path().join("temp");
    tokio::fs::create_dir_all(&temp).await.unwrap();
    tokio::fs::write(temp.join("a.list"), b"x").await.unwrap();
    tokio::fs::write(temp.join("keep.txt"), b"x").await.unwrap();

    cleanup_temp_folder(&temp.to_string_lossy()).await;

    assert!(!temp.join("a.list").exists());
    assert!(temp.join("keep.txt").exists());
}

#[tokio::test]
async fn cleanup_temp_folder_tolerates_a_missing_directory() {
    cleanup_temp_folder("/nonexistent/temp/folder/that/does/not/exist").await;
}

#[tokio::test]
async fn full_pipeline_assessment_happy_path_marks_both_summaries_success() {
    let dir = tempdir().unwrap();
    let e = engine(dir.path(), config(PatchOperation::Assessment), FakePackageManager::new());
    seed_handshake(dir.path(), &e).await;

    let outcome = e.run_full_pipeline().await;

    assert_eq!(outcome, EngineOutcome::Okay);
    assert_eq!(e.status.substatus_status(SubstatusName::ConfigurePatchingSummary), Status::Success);
    assert_eq!(e.status.substatus_status(SubstatusName::PatchAssessmentSummary), Status::Success);

    let core = CoreStateFile::new(dir.path()).read().await.unwrap();
    assert!(core.completed);
}

#[tokio::test]
async fn full_pipeline_installation_runs_batches_then_reassesses() {
    let dir = tempdir().unwrap();
    let packages = vec![
        AvailablePackage { name: "openssl".to_string(), version: "1.0".to_string() },
        AvailablePackage { name: "curl".to_string(), version: "2.0".to_string() },
    ];
    let pm = FakePackageManager::new().with_updates(packages.clone(), vec![]);
    let e = engine(dir.path(), config(PatchOperation::Installation), pm);
    seed_handshake(dir.path(), &e).await;

    let outcome = e.run_full_pipeline().await;

    assert_eq!(outcome, EngineOutcome::Okay);
    assert_eq!(e.status.substatus_status(SubstatusName::PatchInstallationSummary), Status::Success);
    // Re-assessment after install clears and re-populates the assessment summary.
    assert_eq!(e.status.substatus_status(SubstatusName::PatchAssessmentSummary), Status::Success);
}

#[tokio::test]
async fn mark_assessment_failed_forces_installation_substatus_to_error() {
    let dir = tempdir().unwrap();
    let e = engine(dir.path(), config(PatchOperation::Installation), FakePackageManager::new());
    seed_handshake(dir.path(), &e).await;
    let ctx = e.ctx();
    ctx.status
        .set_patch_installation_substatus_json(Status::Success, Vec::new(), false, None);

    crate::operators::installation::mark_assessment_failed(&ctx);

    assert_eq!(e.status.substatus_status(SubstatusName::PatchInstallationSummary), Status::Error);
}

#[tokio::test]
async fn run_full_pipeline_populates_health_store_substatus_when_requested() {
    let dir = tempdir().unwrap();
    let mut cfg = config(PatchOperation::Assessment);
    cfg.health_store_id = Some("hs-123".to_string());
    let e = engine(dir.path(), cfg, FakePackageManager::new());
    seed_handshake(dir.path(), &e).await;

    let outcome = e.run_full_pipeline().await;

    assert_eq!(outcome, EngineOutcome::Okay);
    assert_eq!(e.status.substatus_status(SubstatusName::PatchMetadataForHealthStore), Status::Success);
}

#[tokio::test]
async fn finish_maps_supersession_fault_to_okay_without_marking_complete() {
    let dir = tempdir().unwrap();
    let e = engine(dir.path(), config(PatchOperation::Assessment), FakePackageManager::new());

    let outcome = e.finish(Some(OperatorFault::Supersession)).await;

    assert_eq!(outcome, EngineOutcome::Okay);
    assert!(!dir.path().join("CoreState.json").exists());
}

#[tokio::test]
async fn finish_maps_exit_requested_fault_to_critical_error_reported_and_marks_complete() {
    let dir = tempdir().unwrap();
    let e = engine(dir.path(), config(PatchOperation::ConfigurePatching), FakePackageManager::new());
    seed_handshake(dir.path(), &e).await;

    let outcome = e.finish(Some(OperatorFault::ExitRequested)).await;

    assert_eq!(outcome, EngineOutcome::CriticalErrorReported);
    let core = CoreStateFile::new(dir.path()).read().await.unwrap();
    assert!(core.completed);
}

#[tokio::test]
async fn finish_maps_reboot_requested_fault_to_okay_and_marks_complete() {
    let dir = tempdir().unwrap();
    let e = engine(dir.path(), config(PatchOperation::Installation), FakePackageManager::new());
    seed_handshake(dir.path(), &e).await;

    let outcome = e.finish(Some(OperatorFault::RebootRequested)).await;

    assert_eq!(outcome, EngineOutcome::Okay);
    let core = CoreStateFile::new(dir.path()).read().await.unwrap();
    assert!(core.completed);
}

#[tokio::test]
async fn finish_with_no_fault_marks_complete_and_returns_okay() {
    let dir = tempdir().unwrap();
    let e = engine(dir.path(), config(PatchOperation::Assessment), FakePackageManager::new());
    seed_handshake(dir.path(), &e).await;

    let outcome = e.finish(None).await;

    assert_eq!(outcome, EngineOutcome::Okay);
    let core = CoreStateFile::new(dir.path()).read().await.unwrap();
    assert!(core.completed);
}
