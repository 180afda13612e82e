// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    path::PathBuf,
};

use crate::defs;

/// Per-node outcome counters. The applier runs single-threaded, so plain
/// `Cell`s are enough — there is no need for atomics.
#[derive(Debug, Default)]
pub struct Stats {
    pub nodes_mounted: Cell<u64>,
    pub nodes_fail: Cell<u64>,
    pub nodes_whiteout: Cell<u64>,
}

impl Stats {
    pub fn mounted(&self) {
        self.nodes_mounted.set(self.nodes_mounted.get() + 1);
    }

    pub fn whiteout(&self) {
        self.nodes_whiteout.set(self.nodes_whiteout.get() + 1);
    }

    pub fn fail(&self) {
        self.nodes_fail.set(self.nodes_fail.get() + 1);
    }
}

/// Session-scoped state for one `magic_mount` run.
pub struct MagicMount {
    pub module_dir: PathBuf,
    pub mount_source: String,
    pub enable_unmountable: bool,
    pub extra_partitions: Vec<String>,
    pub stats: Stats,
    failed_modules: RefCell<HashSet<String>>,
}

impl MagicMount {
    pub fn init() -> Self {
        Self {
            module_dir: PathBuf::from(defs::DEFAULT_MODULE_DIR),
            mount_source: defs::DEFAULT_MOUNT_SOURCE.to_string(),
            enable_unmountable: true,
            extra_partitions: Vec::new(),
            stats: Stats::default(),
            failed_modules: RefCell::new(HashSet::new()),
        }
    }

    /// Record that `module_name` had a node fail to apply, so the module
    /// registry can warn about it on the next boot. Called by the applier;
    /// never by the oracle or builder.
    pub fn mark_failed(&self, module_name: &str) {
        self.failed_modules.borrow_mut().insert(module_name.to_string());
    }

    pub fn failed_modules(&self) -> Vec<String> {
        let mut v: Vec<String> = self.failed_modules.borrow().iter().cloned().collect();
        v.sort();
        v
    }

    /// Release owned state and persist which modules failed this run, if
    /// any, for `inventory::scan` to surface on the next invocation.
    pub fn cleanup(&self) {
        let failed = self.failed_modules();
        if failed.is_empty() {
            return;
        }
        if let Err(e) = crate::registry::persist_failed(&failed) {
            log::warn!("failed to persist failed-module registry: {e:#}");
        }
    }
}
