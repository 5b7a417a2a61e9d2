// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Execution environment override, read from `AZPGS_LPE_ENV`.

use std::fmt;

/// Execution environment. Gates a handful of behaviors (e.g. whether the
/// telemetry directory is wiped on startup); unrecognized or absent values
/// coerce to `Prod` rather than failing startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecEnv {
    Dev,
    Test,
    #[default]
    Prod,
}

impl ExecEnv {
    pub const ENV_VAR: &'static str = "AZPGS_LPE_ENV";

    pub fn from_env() -> Self {
        match std::env::var(Self::ENV_VAR) {
            Ok(v) => Self::from_str(&v),
            Err(_) => Self::Prod,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Self::Dev,
            "test" => Self::Test,
            _ => Self::Prod,
        }
    }
}

impl fmt::Display for ExecEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dev => "Dev",
            Self::Test => "Test",
            Self::Prod => "Prod",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_value_coerces_to_prod() {
        assert_eq!(ExecEnv::from_str("staging"), ExecEnv::Prod);
    }

    #[test]
    fn recognizes_case_insensitively() {
        assert_eq!(ExecEnv::from_str("DEV"), ExecEnv::Dev);
        assert_eq!(ExecEnv::from_str("Test"), ExecEnv::Test);
    }
}
