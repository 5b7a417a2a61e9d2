// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Normalizes the wrapper's bespoke `-flagName value` argv shape (§6.1),
//! case-insensitive key matching included, into the double-dash lowercase
//! long-flag shape `clap`'s derive macros expect.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "azgps-lpe-core", disable_help_flag = true, disable_version_flag = true)]
pub struct RawArgs {
    #[arg(long = "sequencenumber")]
    pub sequence_number: Option<i64>,

    #[arg(long = "environmentsettings")]
    pub environment_settings: Option<String>,

    #[arg(long = "configsettings")]
    pub config_settings: Option<String>,

    /// Present in the external contract but currently unused by the core (§6.1).
    #[arg(long = "protectedconfigsettings")]
    pub protected_config_settings: Option<String>,

    #[arg(long = "autoassessonly")]
    pub auto_assess_only: Option<String>,

    /// Internal test knob; accepted but not acted on by the core itself.
    #[arg(long = "recorderenabled")]
    pub recorder_enabled: Option<String>,

    /// Internal test knob; accepted but not acted on by the core itself.
    #[arg(long = "emulatorenabled")]
    pub emulator_enabled: Option<String>,
}

/// Rewrites every single-dash alphabetic flag token (`-sequenceNumber`) into
/// a double-dash lowercase long flag (`--sequencenumber`) so the keys match
/// case-insensitively regardless of how the wrapper cased them, and so
/// `clap`'s ordinary long-flag matching can be used unmodified.
pub fn normalize_argv(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            if arg.starts_with("--") {
                return arg;
            }
            let Some(name) = arg.strip_prefix('-') else {
                return arg;
            };
            if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                return arg;
            }
            format!("--{}", name.to_ascii_lowercase())
        })
        .collect()
}

pub fn parse_bool_flag(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => v.eq_ignore_ascii_case("true"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_single_dash_mixed_case_flags() {
        let normalized = normalize_argv(
            ["azgps-lpe-core", "-sequenceNumber", "7", "-autoAssessOnly", "True"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(
            normalized,
            vec!["azgps-lpe-core", "--sequencenumber", "7", "--autoassessonly", "True"]
        );
    }

    #[test]
    fn leaves_values_and_double_dash_untouched() {
        let normalized = normalize_argv(["-configSettings", "eyJmb28iOiJiYXIifQ=="].into_iter().map(String::from));
        assert_eq!(normalized, vec!["--configsettings", "eyJmb28iOiJiYXIifQ=="]);
    }

    #[test]
    fn parse_bool_flag_defaults_when_absent() {
        assert!(!parse_bool_flag(None, false));
        assert!(parse_bool_flag(Some("True"), false));
        assert!(!parse_bool_flag(Some("False"), true));
    }
}
