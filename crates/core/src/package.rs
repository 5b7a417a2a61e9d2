// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Package record shape shared by assessment and installation reporting.

use crate::operation::{Classification, PatchState};
use serde::{Deserialize, Serialize};

/// One package's assessment/installation result, as it appears in the
/// `patches` array of a substatus's formatted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub classifications: Vec<Classification>,
    pub patch_state: PatchState,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        classifications: Vec<Classification>,
        patch_state: PatchState,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            classifications,
            patch_state,
        }
    }

    /// The highest-priority classification this package carries, used for
    /// the truncation sort key (§4.3): critical/security packages are kept
    /// longest when the package list must be trimmed to fit the status
    /// file's size budget.
    pub fn primary_classification(&self) -> Classification {
        self.classifications
            .iter()
            .copied()
            .min_by_key(Classification::drop_priority)
            .unwrap_or(Classification::Unclassified)
    }
}

/// Sorts packages so that the ones least safe to drop (by classification,
/// then by patch state) come first, and the ones safest to drop under a
/// size-budget truncation come last.
pub fn sort_for_truncation(packages: &mut [PackageRecord]) {
    packages.sort_by_key(|p| {
        (
            p.primary_classification().drop_priority(),
            p.patch_state.drop_priority(),
            p.name.clone(),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_classification_picks_lowest_drop_priority() {
        let p = PackageRecord::new(
            "libssl",
            "1.1",
            vec![Classification::Other, Classification::Security],
            PatchState::Available,
        );
        assert_eq!(p.primary_classification(), Classification::Security);
    }

    #[test]
    fn sort_for_truncation_keeps_critical_first() {
        let mut packages = vec![
            PackageRecord::new("a", "1", vec![Classification::Other], PatchState::Available),
            PackageRecord::new("b", "1", vec![Classification::Critical], PatchState::Available),
        ];
        sort_for_truncation(&mut packages);
        assert_eq!(packages[0].name, "b");
    }
}
