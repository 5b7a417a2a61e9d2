// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::LifecycleManager;
use crate::operators::{Operator, OperatorContext};
use lpe_adapters::fake::FakePackageManager;
use lpe_adapters::package_manager::AvailablePackage;
use lpe_core::{CloudType, ExecutionConfig, FakeClock, Iso8601Duration, PatchOperation, PlatformMode, RebootSetting};
use lpe_storage::{StatusHandler, TelemetryWriter};
use std::sync::Arc;
use tempfile::tempdir;

fn config(sequence_number: i64, exec_auto_assess_only: bool) -> ExecutionConfig {
    ExecutionConfig {
        sequence_number,
        activity_id: "activity".to_string(),
        cloud_type: Some(CloudType::Azure),
        operation: PatchOperation::Assessment,
        start_time: "2026-07-28T00:00:00Z".to_string(),
        maximum_duration: Iso8601Duration::from_seconds(3600),
        reboot_setting: RebootSetting::IfRequired,
        classifications_to_include: vec![],
        patches_to_include: vec![],
        patches_to_exclude: vec![],
        maintenance_run_id: None,
        health_store_id: None,
        patch_mode: PlatformMode::ImageDefault,
        assessment_mode: PlatformMode::ImageDefault,
        maximum_assessment_interval: None,
        exec_auto_assess_only,
    }
}

async fn context(dir: &std::path::Path, cfg: ExecutionConfig, pm: FakePackageManager) -> OperatorContext {
    std::fs::write(
        dir.join("ExtState.json"),
        format!(r#"{{"extensionSequence":{{"number":{},"operation":"Assessment"}}}}"#, cfg.sequence_number),
    )
    .unwrap();
    let lifecycle = LifecycleManager::new(CloudType::Azure, dir, None, Arc::new(FakeClock::new(0)));
    lifecycle.start_run(cfg.sequence_number, "Assessment").await.unwrap();
    OperatorContext {
        status: Arc::new(StatusHandler::new(dir, cfg.sequence_number, cfg.activity_id.clone(), cfg.operation)),
        telemetry: Arc::new(TelemetryWriter::new(dir.join("events"), false)),
        lifecycle: Arc::new(lifecycle),
        package_manager: Arc::new(pm),
        config: Arc::new(cfg),
    }
}

#[tokio::test]
async fn assessment_happy_path_reports_success_with_classified_patches() {
    let dir = tempdir().unwrap();
    let pm = FakePackageManager::new().with_updates(
        vec![
            AvailablePackage { name: "openssl".to_string(), version: "1.1".to_string() },
            AvailablePackage { name: "vim".to_string(), version: "8.0".to_string() },
        ],
        vec![AvailablePackage { name: "openssl".to_string(), version: "1.1".to_string() }],
    );
    let ctx = context(dir.path(), config(1, false), pm).await;
    let operator = AssessmentOperator;

    let fault = super::super::run_with_retries(&operator, &ctx).await;
    assert!(fault.is_none());
    assert_eq!(ctx.status.substatus_status(SubstatusName::PatchAssessmentSummary), Status::Success);
}

#[tokio::test]
async fn should_run_is_always_true_outside_auto_assess_only() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), config(1, false), FakePackageManager::new()).await;
    assert!(AssessmentOperator.should_run(&ctx).await);
}

#[tokio::test]
async fn should_run_is_true_on_first_ever_auto_assessment_attempt() {
    let dir = tempdir().unwrap();
    let mut cfg = config(1, true);
    cfg.maximum_assessment_interval = Some(Iso8601Duration::from_seconds(3600));
    let ctx = context(dir.path(), cfg, FakePackageManager::new()).await;
    assert!(AssessmentOperator.should_run(&ctx).await);
}

#[tokio::test]
async fn should_run_is_false_before_the_interval_elapses() {
    let dir = tempdir().unwrap();
    let mut cfg = config(1, true);
    cfg.maximum_assessment_interval = Some(Iso8601Duration::from_seconds(3600));
    let ctx = context(dir.path(), cfg, FakePackageManager::new()).await;
    ctx.lifecycle.record_assessment_attempt_start(1).await.unwrap();
    assert!(!AssessmentOperator.should_run(&ctx).await);
}
