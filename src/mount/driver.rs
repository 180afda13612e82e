// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The driver: stages a private tmpfs workdir, hands the merged tree to the
// applier rooted at "/", and tears the staging area down regardless of
// outcome.

use std::path::Path;

use anyhow::{Context, Result};
use rustix::mount::{mount, mount_change, unmount, MountFlags, MountPropagationFlags, UnmountFlags};

use crate::mount::{apply::apply_node, context::MagicMount, tree::build_mount_tree};

/// Run one magic-mount pass. `tmp_root` is a directory the caller controls
/// (not `/`) under which a `workdir` subdirectory is created and destroyed.
pub fn magic_mount(ctx: &MagicMount, tmp_root: &Path) -> Result<()> {
    let Some(root) = build_mount_tree(&ctx.module_dir, &ctx.extra_partitions)? else {
        log::info!("no modules contributed anything, magic_mount skipped");
        return Ok(());
    };

    log::debug!("mount tree:\n{root:?}");

    let workdir = tmp_root.join("workdir");
    crate::utils::fs::mkdir_p(&workdir)?;

    mount(
        ctx.mount_source.as_str(),
        &workdir,
        "tmpfs",
        MountFlags::empty(),
        None::<&std::ffi::CStr>,
    )
    .context("mount tmpfs staging area")?;
    mount_change(&workdir, MountPropagationFlags::PRIVATE).context("make staging area private")?;

    let result = apply_node(ctx, Path::new("/"), &workdir, root, false);

    if let Err(e) = unmount(&workdir, UnmountFlags::DETACH) {
        log::error!("detach-unmount staging area {}: {e}", workdir.display());
    }
    let _ = std::fs::remove_dir(&workdir);

    result
}
