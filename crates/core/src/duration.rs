// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ISO-8601 duration parsing, restricted to the `PT[n]H[n]M[n]S` time-only
//! subset used throughout the configuration and systemd-timer surfaces.
//!
//! Only the `PT?H?M?S` shape is supported (no date components, no
//! fractional seconds); that is all the wrapper and the systemd unit
//! manager ever produce or consume.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Iso8601Error {
    #[error("duration string is empty")]
    Empty,
    #[error("duration must start with 'PT': {0:?}")]
    MissingPrefix(String),
    #[error("invalid duration component {0:?}")]
    InvalidComponent(String),
    #[error("duration has no components after 'PT': {0:?}")]
    NoComponents(String),
}

/// A parsed `PT[n]H[n]M[n]S` duration, stored as total seconds.
///
/// Round-trips: parsing a canonical `PT<H>H<M>M<S>S` string and
/// re-serializing yields the same total-seconds value (P10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Iso8601Duration {
    total_seconds: i64,
}

impl Iso8601Duration {
    pub const fn from_seconds(total_seconds: i64) -> Self {
        Self { total_seconds }
    }

    pub const fn seconds(&self) -> i64 {
        self.total_seconds
    }

    /// Parse a string of the form `PT1H30M5S` (any subset of H/M/S, any order
    /// of magnitude, all optional but at least one must be present).
    pub fn parse(s: &str) -> Result<Self, Iso8601Error> {
        if s.is_empty() {
            return Err(Iso8601Error::Empty);
        }
        let rest = s
            .strip_prefix("PT")
            .or_else(|| s.strip_prefix("pt"))
            .ok_or_else(|| Iso8601Error::MissingPrefix(s.to_string()))?;
        if rest.is_empty() {
            return Err(Iso8601Error::NoComponents(s.to_string()));
        }

        let mut total: i64 = 0;
        let mut digits = String::new();
        let mut saw_component = false;

        for c in rest.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let multiplier = match c.to_ascii_uppercase() {
                'H' => 3600,
                'M' => 60,
                'S' => 1,
                _ => return Err(Iso8601Error::InvalidComponent(s.to_string())),
            };
            if digits.is_empty() {
                return Err(Iso8601Error::InvalidComponent(s.to_string()));
            }
            let value: i64 = digits
                .parse()
                .map_err(|_| Iso8601Error::InvalidComponent(s.to_string()))?;
            total += value * multiplier;
            digits.clear();
            saw_component = true;
        }

        if !digits.is_empty() || !saw_component {
            return Err(Iso8601Error::InvalidComponent(s.to_string()));
        }

        Ok(Self { total_seconds: total })
    }

    /// Render as a canonical `PT<H>H<M>M<S>S` string, omitting zero
    /// components except when the whole duration is zero (`PT0S`).
    pub fn to_iso_string(&self) -> String {
        let mut remaining = self.total_seconds;
        let hours = remaining / 3600;
        remaining %= 3600;
        let minutes = remaining / 60;
        let seconds = remaining % 60;

        if hours == 0 && minutes == 0 && seconds == 0 {
            return "PT0S".to_string();
        }

        let mut out = String::from("PT");
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 {
            out.push_str(&format!("{seconds}S"));
        }
        out
    }

    /// Render as a systemd `OnUnitActiveSec=`-compatible interval: lowercase
    /// `h`/`m`/`s` suffixes, concatenated (e.g. `1h30m`), per §4.6.
    pub fn to_systemd_interval(&self) -> String {
        self.to_iso_string()
            .trim_start_matches("PT")
            .to_ascii_lowercase()
    }
}

impl fmt::Display for Iso8601Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso_string())
    }
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
