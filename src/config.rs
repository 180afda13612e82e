// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::defs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_module_dir")]
    pub module_dir: PathBuf,
    #[serde(default = "default_mount_source")]
    pub mount_source: String,
    #[serde(default, deserialize_with = "deserialize_partitions_flexible")]
    pub extra_partitions: Vec<String>,
    #[serde(default)]
    pub disable_umount: bool,
    #[serde(default)]
    pub verbose: bool,
}

fn default_module_dir() -> PathBuf {
    PathBuf::from(defs::DEFAULT_MODULE_DIR)
}

fn default_mount_source() -> String {
    defs::DEFAULT_MOUNT_SOURCE.to_string()
}

/// Accept either a TOML array or a comma-separated string for
/// `extra_partitions`, matching how the rest of this family's configs
/// tolerate both shapes.
fn deserialize_partitions_flexible<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::Vec(v) => Ok(v),
        StringOrVec::String(s) => Ok(s
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module_dir: default_module_dir(),
            mount_source: default_mount_source(),
            extra_partitions: Vec::new(),
            disable_umount: false,
            verbose: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config file {}", path.as_ref().display()))?;
        toml::from_str(&content).with_context(|| format!("parse config file {}", path.as_ref().display()))
    }

    pub fn load_default() -> Result<Self> {
        Self::from_file(defs::CONFIG_FILE)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("serialize config")?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| format!("create config dir {}", parent.display()))?;
        }
        fs::write(path.as_ref(), content).with_context(|| format!("write config file {}", path.as_ref().display()))
    }

    pub fn merge_with_cli(
        &mut self,
        module_dir: Option<PathBuf>,
        mount_source: Option<String>,
        verbose: bool,
        extra_partitions: Vec<String>,
        disable_umount: bool,
    ) {
        if let Some(dir) = module_dir {
            self.module_dir = dir;
        }
        if let Some(source) = mount_source {
            self.mount_source = source;
        }
        if verbose {
            self.verbose = true;
        }
        if !extra_partitions.is_empty() {
            self.extra_partitions = extra_partitions;
        }
        if disable_umount {
            self.disable_umount = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.module_dir, PathBuf::from(defs::DEFAULT_MODULE_DIR));
        assert!(cfg.extra_partitions.is_empty());
        assert!(!cfg.disable_umount);
    }

    #[test]
    fn extra_partitions_accepts_comma_separated_string() {
        let toml_str = "extra_partitions = \"oem, my_product\"";
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.extra_partitions, vec!["oem".to_string(), "my_product".to_string()]);
    }

    #[test]
    fn extra_partitions_accepts_array() {
        let toml_str = "extra_partitions = [\"oem\", \"my_product\"]";
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.extra_partitions, vec!["oem".to_string(), "my_product".to_string()]);
    }

    #[test]
    fn round_trips_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.verbose = true;
        cfg.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.verbose);
    }

    #[test]
    fn merge_with_cli_only_overrides_what_is_given() {
        let mut cfg = Config::default();
        cfg.mount_source = "keepme".to_string();
        cfg.merge_with_cli(Some(PathBuf::from("/custom")), None, false, Vec::new(), false);
        assert_eq!(cfg.module_dir, PathBuf::from("/custom"));
        assert_eq!(cfg.mount_source, "keepme");
    }
}
