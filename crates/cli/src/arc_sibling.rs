// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves the sibling Arc extension's `CoreState.json` the Lifecycle
//! Manager's Arc variant inspects during the auto-assessment gate (§4.5).
//!
//! The wrapper installs each extension version under a versioned directory
//! (`<publisher>.<type>-<version>/config`); when multiple versions coexist
//! the freshest one should win (SPEC_FULL.md Open Question). Directory
//! names sort lexicographically by version for the single-digit/short
//! version strings this wrapper uses, so picking the lexicographically
//! greatest match approximates "freshest" without parsing version numbers.

use std::path::{Path, PathBuf};

const SIBLING_GLOB_SUFFIX: &str = "config/CoreState.json";

/// Globs one level above `config_folder`'s extension directory for a sibling
/// extension's `CoreState.json`, returning the freshest match (if any).
/// Returns `None` when `config_folder` has no discoverable parent or no
/// sibling extension directory exists — a reasonable, non-fatal outcome on
/// a host that only ever ran the Azure lifecycle variant.
pub fn resolve(config_folder: &Path, own_extension_dir_name: &str) -> Option<PathBuf> {
    let extensions_root = config_folder.parent()?.parent()?;
    let pattern = format!("{}/*/{}", extensions_root.display(), SIBLING_GLOB_SUFFIX);
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .ok()?
        .filter_map(Result::ok)
        .filter(|path| {
            path.parent()
                .and_then(Path::parent)
                .and_then(|dir| dir.file_name())
                .map(|name| name != own_extension_dir_name)
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn picks_lexicographically_freshest_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for (ext, _) in [("Microsoft.CPlat.Core.LinuxPatchExtension-1.0", 0), ("Microsoft.CPlat.Core.LinuxPatchExtension-2.0", 0)] {
            fs::create_dir_all(root.join(ext).join("config")).unwrap();
            fs::write(root.join(ext).join("config/CoreState.json"), "{}").unwrap();
        }
        let own_config = root.join("Microsoft.CPlat.Core.LinuxPatchExtension-2.0").join("config");
        let resolved = resolve(&own_config, "Microsoft.CPlat.Core.LinuxPatchExtension-2.0").unwrap();
        assert!(resolved.starts_with(root.join("Microsoft.CPlat.Core.LinuxPatchExtension-1.0")));
    }

    #[test]
    fn none_when_no_sibling_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let own_config = tmp.path().join("only-ext").join("config");
        fs::create_dir_all(&own_config).unwrap();
        assert!(resolve(&own_config, "only-ext").is_none());
    }
}
