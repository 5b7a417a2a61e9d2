// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed replacement for the "privileged-operation markers" the original
//! embedded in exception strings (§9 design note, §7.2): a retry loop can
//! now discriminate by matching a variant instead of sniffing text.

use thiserror::Error;

/// A fault that short-circuits the operator retry loop instead of being
/// retried: the retry driver re-raises these immediately.
#[derive(Debug, Clone, Error)]
pub enum OperatorFault {
    /// The wrapper published a newer sequence number mid-run (§4.5.3, P6).
    #[error("sequence number superseded")]
    Supersession,
    /// Installation determined a reboot is required and time-available.
    #[error("reboot requested")]
    RebootRequested,
    /// The operator determined the process should exit immediately
    /// (e.g. systemd is required but absent for `AutomaticByPlatform`).
    #[error("exit requested")]
    ExitRequested,
}
