// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation, cloud-type, and patch-mode enums shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation requested by the wrapper for a given sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchOperation {
    Assessment,
    Installation,
    ConfigurePatching,
    /// `ConfigurePatching_AutoAssessment` — functionally ConfigurePatching,
    /// distinguished only so the engine can recognize it was triggered by
    /// the systemd auto-assessment timer rather than a wrapper goal state.
    ConfigurePatchingAutoAssessment,
}

impl PatchOperation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Assessment" => Some(Self::Assessment),
            "Installation" => Some(Self::Installation),
            "ConfigurePatching" => Some(Self::ConfigurePatching),
            "ConfigurePatching_AutoAssessment" => Some(Self::ConfigurePatchingAutoAssessment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assessment => "Assessment",
            Self::Installation => "Installation",
            Self::ConfigurePatching => "ConfigurePatching",
            Self::ConfigurePatchingAutoAssessment => "ConfigurePatching_AutoAssessment",
        }
    }

    /// Both `== CONFIGURE_PATCHING` comparison sites mentioned in the
    /// original source collapse to this single predicate: true for either
    /// `ConfigurePatching` or its auto-assessment-triggered variant.
    pub fn is_configure_patching(&self) -> bool {
        matches!(self, Self::ConfigurePatching | Self::ConfigurePatchingAutoAssessment)
    }
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which cloud platform variant of the Lifecycle Manager applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudType {
    Azure,
    Arc,
}

impl CloudType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Azure" => Some(Self::Azure),
            "Arc" => Some(Self::Arc),
            _ => None,
        }
    }
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Azure => write!(f, "Azure"),
            Self::Arc => write!(f, "Arc"),
        }
    }
}

/// Whether/when a reboot may occur as part of Installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RebootSetting {
    Never,
    #[default]
    IfRequired,
    Always,
}

impl RebootSetting {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Never" => Some(Self::Never),
            "IfRequired" => Some(Self::IfRequired),
            "Always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// `ImageDefault` leaves the OS default behavior untouched;
/// `AutomaticByPlatform` means the platform (this engine) owns the setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformMode {
    ImageDefault,
    AutomaticByPlatform,
}

impl PlatformMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ImageDefault" => Some(Self::ImageDefault),
            "AutomaticByPlatform" => Some(Self::AutomaticByPlatform),
            _ => None,
        }
    }
}

/// Patch severity classification bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Critical,
    Security,
    SecurityEsm,
    Other,
    Unclassified,
}

impl Classification {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Critical" => Some(Self::Critical),
            "Security" => Some(Self::Security),
            "Security-ESM" => Some(Self::SecurityEsm),
            "Other" => Some(Self::Other),
            "Unclassified" => Some(Self::Unclassified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Security => "Security",
            Self::SecurityEsm => "Security-ESM",
            Self::Other => "Other",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Truncation-ordering key (§4.3): higher is dropped first.
    pub fn drop_priority(&self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::Security => 2,
            Self::SecurityEsm => 3,
            Self::Other => 4,
            Self::Unclassified => 5,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-package installation/assessment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchState {
    Failed,
    Installed,
    Available,
    Pending,
    Excluded,
    NotSelected,
}

impl PatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "Failed",
            Self::Installed => "Installed",
            Self::Available => "Available",
            Self::Pending => "Pending",
            Self::Excluded => "Excluded",
            Self::NotSelected => "NotSelected",
        }
    }

    /// Truncation-ordering key (§4.3): higher is dropped first.
    pub fn drop_priority(&self) -> u8 {
        match self {
            Self::Failed => 1,
            Self::Installed => 2,
            Self::Available => 3,
            Self::Pending => 4,
            Self::Excluded => 5,
            Self::NotSelected => 6,
        }
    }
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_patching_predicate_covers_both_branches() {
        assert!(PatchOperation::ConfigurePatching.is_configure_patching());
        assert!(PatchOperation::ConfigurePatchingAutoAssessment.is_configure_patching());
        assert!(!PatchOperation::Assessment.is_configure_patching());
    }

    #[test]
    fn classification_drop_priority_orders_critical_last_to_drop() {
        assert!(Classification::Critical.drop_priority() < Classification::Unclassified.drop_priority());
    }

    #[test]
    fn patch_state_drop_priority_orders_failed_last_to_drop() {
        assert!(PatchState::Failed.drop_priority() < PatchState::NotSelected.drop_priority());
    }
}
