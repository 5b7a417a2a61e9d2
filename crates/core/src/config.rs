// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `ExecutionConfig` and `EnvironmentSettings`: the immutable, process-wide
//! configuration decoded from the wrapper's two base64 JSON blobs (§6.1).

use crate::duration::Iso8601Duration;
use crate::operation::{CloudType, PatchOperation, PlatformMode, RebootSetting};
use serde::Deserialize;
use thiserror::Error;

/// Sentinel the wrapper uses in place of an absent optional string field.
pub const DEFAULT_UNSPECIFIED_VALUE: &str = "DEFAULT_UNSPECIFIED_VALUE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to decode base64 {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("failed to parse JSON for {field}: {source}")]
    Json {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("unrecognized value {value:?} for field {field}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid duration for {field}: {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: crate::duration::Iso8601Error,
    },
}

/// Directories and capability flags the wrapper hands over via
/// `-environmentSettings`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(rename = "logFolder")]
    pub log_folder: String,
    #[serde(rename = "configFolder")]
    pub config_folder: String,
    #[serde(rename = "statusFolder")]
    pub status_folder: String,
    #[serde(rename = "eventsFolder")]
    pub events_folder: String,
    #[serde(rename = "tempFolder")]
    pub temp_folder: String,
    #[serde(rename = "telemetrySupported", default)]
    pub telemetry_supported: bool,
}

/// Raw shape of the `-configSettings` blob, before duration/enum parsing.
#[derive(Debug, Clone, Deserialize)]
struct RawConfigSettings {
    #[serde(rename = "cloudType", default)]
    cloud_type: Option<String>,
    operation: String,
    #[serde(rename = "activityId")]
    activity_id: String,
    #[serde(rename = "startTime")]
    start_time: String,
    #[serde(rename = "maximumDuration")]
    maximum_duration: String,
    #[serde(rename = "rebootSetting", default)]
    reboot_setting: Option<String>,
    #[serde(rename = "classificationsToInclude", default)]
    classifications_to_include: Vec<String>,
    #[serde(rename = "patchesToInclude", default)]
    patches_to_include: Vec<String>,
    #[serde(rename = "patchesToExclude", default)]
    patches_to_exclude: Vec<String>,
    #[serde(rename = "maintenanceRunId", default)]
    maintenance_run_id: Option<String>,
    #[serde(rename = "healthStoreId", default)]
    health_store_id: Option<String>,
    #[serde(rename = "patchMode", default)]
    patch_mode: Option<String>,
    #[serde(rename = "assessmentMode", default)]
    assessment_mode: Option<String>,
    #[serde(rename = "maximumAssessmentInterval", default)]
    maximum_assessment_interval: Option<String>,
}

/// Immutable, process-wide configuration. Constructed once per process from
/// the decoded `-configSettings` blob plus the sequence number supplied
/// separately on the command line.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub sequence_number: i64,
    pub activity_id: String,
    pub cloud_type: Option<CloudType>,
    pub operation: PatchOperation,
    pub start_time: String,
    pub maximum_duration: Iso8601Duration,
    pub reboot_setting: RebootSetting,
    pub classifications_to_include: Vec<String>,
    pub patches_to_include: Vec<String>,
    pub patches_to_exclude: Vec<String>,
    pub maintenance_run_id: Option<String>,
    pub health_store_id: Option<String>,
    pub patch_mode: PlatformMode,
    pub assessment_mode: PlatformMode,
    pub maximum_assessment_interval: Option<Iso8601Duration>,
    pub exec_auto_assess_only: bool,
}

/// Drops the `DEFAULT_UNSPECIFIED_VALUE` sentinel to `None`.
fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| v != DEFAULT_UNSPECIFIED_VALUE && !v.is_empty())
}

impl ExecutionConfig {
    pub fn from_base64_json(
        sequence_number: i64,
        config_settings_b64: &str,
        exec_auto_assess_only: bool,
    ) -> Result<Self, ConfigError> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(config_settings_b64)
            .map_err(|source| ConfigError::Base64 {
                field: "configSettings",
                source,
            })?;
        let raw: RawConfigSettings =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
                field: "configSettings",
                source,
            })?;

        let operation = PatchOperation::parse(&raw.operation).ok_or_else(|| ConfigError::InvalidValue {
            field: "operation",
            value: raw.operation.clone(),
        })?;

        let cloud_type = raw
            .cloud_type
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(|v| {
                CloudType::parse(v).ok_or_else(|| ConfigError::InvalidValue {
                    field: "cloudType",
                    value: v.to_string(),
                })
            })
            .transpose()?;

        let reboot_setting = match raw.reboot_setting.as_deref() {
            None => RebootSetting::default(),
            Some(v) => RebootSetting::parse(v).ok_or_else(|| ConfigError::InvalidValue {
                field: "rebootSetting",
                value: v.to_string(),
            })?,
        };

        let patch_mode = match raw.patch_mode.as_deref() {
            None => PlatformMode::ImageDefault,
            Some(v) => PlatformMode::parse(v).ok_or_else(|| ConfigError::InvalidValue {
                field: "patchMode",
                value: v.to_string(),
            })?,
        };

        let assessment_mode = match raw.assessment_mode.as_deref() {
            None => PlatformMode::ImageDefault,
            Some(v) => PlatformMode::parse(v).ok_or_else(|| ConfigError::InvalidValue {
                field: "assessmentMode",
                value: v.to_string(),
            })?,
        };

        let maximum_duration =
            Iso8601Duration::parse(&raw.maximum_duration).map_err(|source| ConfigError::Duration {
                field: "maximumDuration",
                source,
            })?;

        let maximum_assessment_interval = raw
            .maximum_assessment_interval
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(Iso8601Duration::parse)
            .transpose()
            .map_err(|source| ConfigError::Duration {
                field: "maximumAssessmentInterval",
                source,
            })?;

        Ok(Self {
            sequence_number,
            activity_id: raw.activity_id,
            cloud_type,
            operation,
            start_time: raw.start_time,
            maximum_duration,
            reboot_setting,
            classifications_to_include: raw.classifications_to_include,
            patches_to_include: raw.patches_to_include,
            patches_to_exclude: raw.patches_to_exclude,
            maintenance_run_id: normalize_optional(raw.maintenance_run_id),
            health_store_id: normalize_optional(raw.health_store_id),
            patch_mode,
            assessment_mode,
            maximum_assessment_interval,
            exec_auto_assess_only,
        })
    }
}

impl EnvironmentSettings {
    pub fn from_base64_json(environment_settings_b64: &str) -> Result<Self, ConfigError> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(environment_settings_b64)
            .map_err(|source| ConfigError::Base64 {
                field: "environmentSettings",
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
            field: "environmentSettings",
            source,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
