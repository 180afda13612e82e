// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// Module listing for the CLI's `modules` subcommand. Distinct from
// `mount::tree`'s builder: this walks the module directory without merging
// anything, and annotates each entry with whatever state is visible from the
// filesystem plus the prior run's failed-module registry. It never filters
// disabled/failed modules out of the listing -- only the mount-tree builder
// decides what actually gets applied.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{defs, registry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub path: PathBuf,
    pub disabled: bool,
    pub removed: bool,
    pub skip_mount: bool,
    pub failed_last_run: bool,
}

impl ModuleInfo {
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.removed && !self.skip_mount
    }
}

/// List every module subdirectory under `module_dir`, alphabetically, each
/// annotated with its marker files and whether it failed to apply last run.
pub fn scan(module_dir: &Path) -> Result<Vec<ModuleInfo>> {
    if !module_dir.exists() {
        return Ok(Vec::new());
    }

    let failed = registry::load_failed().unwrap_or_default();

    let mut entries: Vec<PathBuf> = module_dir
        .read_dir()
        .with_context(|| format!("readdir {}", module_dir.display()))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    let modules = entries
        .into_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let disabled = path.join(defs::DISABLE_FILE_NAME).exists();
            let removed = path.join(defs::REMOVE_FILE_NAME).exists();
            let skip_mount = path.join(defs::SKIP_MOUNT_FILE_NAME).exists();
            let failed_last_run = failed.contains(&name);
            ModuleInfo {
                name,
                path,
                disabled,
                removed,
                skip_mount,
                failed_last_run,
            }
        })
        .collect();

    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_module_dir_is_an_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("nonexistent");
        assert!(scan(&modules).unwrap().is_empty());
    }

    #[test]
    fn marker_files_are_reflected_without_being_filtered_out() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("modules");
        fs::create_dir_all(modules.join("modA")).unwrap();
        fs::write(modules.join("modA").join(defs::DISABLE_FILE_NAME), "").unwrap();
        fs::create_dir_all(modules.join("modB")).unwrap();

        let found = scan(&modules).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].disabled);
        assert!(!found[0].is_active());
        assert!(found[1].is_active());
    }
}
