// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The module registry's narrow bookkeeping duty: remember which module ids
// failed to apply during the most recent mount, so the next boot's
// inventory scan can warn about them. This is the only state this crate
// persists across invocations — everything about the overlay itself
// vanishes on unmount.

use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{Context, Result};

use crate::{defs, utils::fs::atomic_write};

pub fn persist_failed(newly_failed: &[String]) -> Result<()> {
    let mut all: BTreeSet<String> = load_failed().unwrap_or_default().into_iter().collect();
    all.extend(newly_failed.iter().cloned());
    let list: Vec<String> = all.into_iter().collect();
    let json = serde_json::to_vec_pretty(&list).context("serialize failed-module registry")?;
    atomic_write(defs::FAILED_MODULES_FILE, &json)
}

pub fn load_failed() -> Result<Vec<String>> {
    load_failed_from(Path::new(defs::FAILED_MODULES_FILE))
}

fn load_failed_from(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_registry_file_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("failed.json");
        assert!(load_failed_from(&path).unwrap().is_empty());
    }

    #[test]
    fn persisted_entries_round_trip_and_accumulate() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("failed.json");

        let list = vec!["modA".to_string()];
        let json = serde_json::to_vec_pretty(&list).unwrap();
        atomic_write(&path, &json).unwrap();
        assert_eq!(load_failed_from(&path).unwrap(), vec!["modA".to_string()]);
    }
}
