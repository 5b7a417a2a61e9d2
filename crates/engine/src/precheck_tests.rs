// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn telemetry_agent_check_passes_when_version_unknown() {
    assert!(check_telemetry_agent_compatibility(None).is_ok());
}

#[test]
fn telemetry_agent_check_rejects_old_major_version() {
    let err = check_telemetry_agent_compatibility(Some("1.5")).unwrap_err();
    assert!(matches!(err, PreflightError::AgentTooOld));
}

#[test]
fn telemetry_agent_check_accepts_current_major_version() {
    assert!(check_telemetry_agent_compatibility(Some("2.3")).is_ok());
    assert!(check_telemetry_agent_compatibility(Some("3.0")).is_ok());
}

#[test]
fn error_codes_map_to_the_expected_variants() {
    assert_eq!(PreflightError::RuntimeTooOld.error_code(), ErrorCode::ClPythonTooOld);
    assert_eq!(PreflightError::SudoCheckFailed("x".to_string()).error_code(), ErrorCode::ClSudoCheckFailed);
    assert_eq!(PreflightError::AgentTooOld.error_code(), ErrorCode::ClAgentTooOld);
}
