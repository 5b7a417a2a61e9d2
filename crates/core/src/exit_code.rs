// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Process exit codes returned by the CLI entry point.

/// Maps directly onto the exit codes the wrapper inspects after each
/// invocation. Values are part of the external contract with the wrapper
/// and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Okay = 0,
    CriticalError = 1,
    CriticalErrorNoLog = 2,
    CriticalErrorNoStatus = 3,
    CriticalErrorReported = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for i32 {
    fn from(value: ExitCode) -> Self {
        value.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_external_contract() {
        assert_eq!(ExitCode::Okay.code(), 0);
        assert_eq!(ExitCode::CriticalError.code(), 1);
        assert_eq!(ExitCode::CriticalErrorNoLog.code(), 2);
        assert_eq!(ExitCode::CriticalErrorNoStatus.code(), 3);
        assert_eq!(ExitCode::CriticalErrorReported.code(), 4);
    }
}
