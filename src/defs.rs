// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub const DEFAULT_MODULE_DIR: &str = "/data/adb/modules";
pub const DEFAULT_MOUNT_SOURCE: &str = "magic_mount";
pub const RUN_DIR: &str = "/data/adb/magic_mount/run";
pub const CONFIG_FILE: &str = "/data/adb/magic_mount/config.toml";
pub const FAILED_MODULES_FILE: &str = "/data/adb/magic_mount/run/failed_modules.json";

pub const DISABLE_FILE_NAME: &str = "disable";
pub const REMOVE_FILE_NAME: &str = "remove";
pub const SKIP_MOUNT_FILE_NAME: &str = "skip_mount";

pub const REPLACE_DIR_FILE_NAME: &str = ".replace";
pub const REPLACE_DIR_XATTR: &str = "trusted.overlay.opaque";

/// Partitions a module may ship at its top level, alongside `system/`, and
/// which get grafted directly under the merged root rather than under `system`.
pub const ROOT_PARTITIONS: [&str; 4] = ["vendor", "system_ext", "product", "odm"];
