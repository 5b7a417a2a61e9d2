// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! azgps-lpe-core - in-guest patch management core execution engine.
//!
//! Invoked by the host-side wrapper with a sequence number and two base64
//! JSON blobs (§6.1). Decodes them, wires the Lifecycle Manager, Status
//! Handler, Telemetry Writer, package-manager adapter, and patch operators,
//! runs the Core Execution Engine, and maps its outcome to the external
//! exit-code contract (§4.8).

mod arc_sibling;
mod args;

use args::RawArgs;
use clap::Parser;
use lpe_adapters::systemd::SystemdUnitManager;
use lpe_core::{Clock, CloudType, EnvironmentSettings, ErrorCode, ExecEnv, ExecutionConfig, ExitCode, SystemClock};
use lpe_engine::operators::configure_patching::AUTO_ASSESSMENT_UNIT_NAME;
use lpe_engine::operators::ConfigurePatchingOperator;
use lpe_engine::{CoreExecutionEngine, LifecycleManager};
use lpe_storage::{CompositeLogger, LogLevel, StatusHandler, TelemetryWriter, MAX_AUTO_ASSESSMENT_LOGFILE_SIZE_BYTES};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(fatal) => {
            eprintln!("azgps-lpe-core: {fatal}");
            fatal.exit_code()
        }
    };
    std::process::exit(exit_code.code());
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("missing required argument -sequenceNumber")]
    MissingSequenceNumber,
    #[error("missing required argument -environmentSettings")]
    MissingEnvironmentSettings,
    #[error("missing required argument -configSettings")]
    MissingConfigSettings,
    #[error("failed to decode -environmentSettings: {0}")]
    EnvironmentSettings(lpe_core::ConfigError),
    #[error("failed to decode -configSettings: {0}")]
    ExecutionConfig(lpe_core::ConfigError),
}

impl StartupError {
    /// Environment-settings failures leave us without even a log folder;
    /// config-settings failures happen after logging is already set up.
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::MissingSequenceNumber | Self::MissingEnvironmentSettings | Self::EnvironmentSettings(_) => {
                ExitCode::CriticalErrorNoLog
            }
            Self::MissingConfigSettings | Self::ExecutionConfig(_) => ExitCode::CriticalErrorNoStatus,
        }
    }
}

async fn run() -> Result<ExitCode, StartupError> {
    let _exec_env = ExecEnv::from_env();

    let argv = args::normalize_argv(std::env::args());
    let raw = RawArgs::parse_from(argv);

    let sequence_number = raw.sequence_number.ok_or(StartupError::MissingSequenceNumber)?;
    let environment_settings_b64 = raw.environment_settings.ok_or(StartupError::MissingEnvironmentSettings)?;
    let config_settings_b64 = raw.config_settings.ok_or(StartupError::MissingConfigSettings)?;
    let exec_auto_assess_only = args::parse_bool_flag(raw.auto_assess_only.as_deref(), false);

    let environment = EnvironmentSettings::from_base64_json(&environment_settings_b64)
        .map_err(StartupError::EnvironmentSettings)?;

    let _log_guard = setup_logging(&environment.log_folder, exec_auto_assess_only);

    let config = ExecutionConfig::from_base64_json(sequence_number, &config_settings_b64, exec_auto_assess_only)
        .map_err(StartupError::ExecutionConfig)?;

    Ok(run_async(environment, config, environment_settings_b64, config_settings_b64).await)
}

fn setup_logging(log_folder: &str, auto_assess_only: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(log_folder).ok()?;
    let file_name = if auto_assess_only { "azgps-lpe-core-auto-assessment.log" } else { "azgps-lpe-core.log" };
    let appender = tracing_appender::rolling::never(log_folder, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init();
    Some(guard)
}

async fn run_async(
    environment: EnvironmentSettings,
    config: ExecutionConfig,
    environment_settings_b64: String,
    config_settings_b64: String,
) -> ExitCode {
    let config_folder = PathBuf::from(&environment.config_folder);
    let status_folder = PathBuf::from(&environment.status_folder);

    let status = Arc::new(StatusHandler::new(
        status_folder,
        config.sequence_number,
        config.activity_id.clone(),
        config.operation,
    ));

    let telemetry = Arc::new(TelemetryWriter::new(&environment.events_folder, environment.telemetry_supported));

    let log_path = PathBuf::from(&environment.log_folder).join("azgps-lpe-core.log");
    status.set_log_path(log_path.to_string_lossy().to_string());

    let rotate_threshold = config.exec_auto_assess_only.then_some(MAX_AUTO_ASSESSMENT_LOGFILE_SIZE_BYTES);
    let logger = CompositeLogger::new(log_path, rotate_threshold);
    logger.attach_telemetry(telemetry.clone());
    logger
        .log(LogLevel::Info, "CoreMain", &config.activity_id, &format!("starting sequence {}", config.sequence_number))
        .await
        .ok();

    let cloud_type = resolve_cloud_type(&config).await;

    let own_extension_dir_name = config_folder
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let arc_sibling_core_state_path = if cloud_type == CloudType::Arc {
        arc_sibling::resolve(&config_folder, &own_extension_dir_name)
    } else {
        None
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lifecycle = Arc::new(LifecycleManager::new(cloud_type, &config_folder, arc_sibling_core_state_path, clock));

    let package_manager: Arc<dyn lpe_adapters::PackageManager> = Arc::from(lpe_adapters::detect_package_manager());

    let exec_start_command = format!(
        "{} -sequenceNumber {} -environmentSettings {} -configSettings {} -autoAssessOnly True",
        std::env::current_exe().map(|p| p.display().to_string()).unwrap_or_else(|_| "azgps-lpe-core".to_string()),
        config.sequence_number,
        environment_settings_b64,
        config_settings_b64,
    );
    let configure_patching = ConfigurePatchingOperator {
        systemd: SystemdUnitManager::new(AUTO_ASSESSMENT_UNIT_NAME),
        auto_os_patch_backup_path: config_folder.join("ImageDefaultPatchConfiguration.bak"),
        exec_start_command,
    };

    let engine = CoreExecutionEngine {
        config: Arc::new(config),
        env: environment,
        status,
        telemetry,
        lifecycle,
        package_manager,
        configure_patching,
        telemetry_agent_version: std::env::var("AZGPS_LPE_TELEMETRY_AGENT_VERSION").ok(),
    };

    match tokio::spawn(async move { engine.run().await }).await {
        Ok(outcome) => outcome.into(),
        Err(join_err) => {
            logger
                .log(
                    LogLevel::Error,
                    "CoreMain",
                    "",
                    &format!("{}: {join_err}", ErrorCode::Error.as_str()),
                )
                .await
                .ok();
            ExitCode::CriticalErrorReported
        }
    }
}

/// Determines the cloud-type variant of the Lifecycle Manager to run.
/// Honors an explicit `cloudType` in config; otherwise probes IMDS only
/// when running in auto-assessment mode (§6.6), and defaults to Azure
/// for a main-sequence run with no explicit value (the common case — a
/// wrapper that cares about Arc always sets `cloudType` explicitly).
async fn resolve_cloud_type(config: &ExecutionConfig) -> CloudType {
    if let Some(cloud_type) = config.cloud_type {
        return cloud_type;
    }
    if config.exec_auto_assess_only {
        return lpe_adapters::imds::probe_cloud_type().await;
    }
    CloudType::Azure
}
