// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The applier: the recursive walk that realizes a mount-tree node — binding
// module files, cloning symlinks, staging and moving tmpfs overlays, and
// mirroring every sibling a module didn't touch so the overlay never erases
// what was already there.

use std::{
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use rustix::{
    fs::{chmod, chown, Gid, Mode, Uid},
    mount::{mount_bind, mount_change, mount_move, mount_remount, MountFlags, MountPropagationFlags},
};

use crate::{
    mount::{
        context::MagicMount,
        kernel_notify,
        mirror::mirror_entry,
        node::{Node, NodeKind},
        oracle::need_tmpfs,
    },
    utils::fs::{copy_selcon, mkdir_p},
};

fn module_name_for(child: &Node, parent_module_name: &Option<String>) -> Option<String> {
    child.module_name.clone().or_else(|| parent_module_name.clone())
}

fn record_child_failure(ctx: &MagicMount, path: &Path, name: &str, module_name: Option<&str>, err: &anyhow::Error) {
    match module_name {
        Some(mn) => {
            log::error!("child {}/{name} failed (module: {mn}): {err:#}", path.display());
            ctx.mark_failed(mn);
        }
        None => log::error!("child {}/{name} failed (no owning module): {err:#}", path.display()),
    }
    ctx.stats.fail();
}

fn apply_regular(ctx: &MagicMount, path: &Path, wpath: &Path, node: &Node, has_tmpfs: bool) -> Result<()> {
    let Some(module_path) = &node.module_path else {
        bail!("cannot mount root file {}: no module_path", path.display());
    };

    let target: &Path = if has_tmpfs {
        if let Some(parent) = wpath.parent() {
            mkdir_p(parent)?;
        }
        std::fs::File::create(wpath).with_context(|| format!("create {}", wpath.display()))?;
        wpath
    } else {
        path
    };

    mount_bind(module_path, target)
        .with_context(|| format!("bind {} -> {}", module_path.display(), target.display()))?;

    let _ = mount_change(target, MountPropagationFlags::PRIVATE);

    if let Err(e) = mount_remount(target, MountFlags::RDONLY | MountFlags::BIND, "") {
        log::warn!("remount {} ro: {e}", target.display());
    }

    if !has_tmpfs && ctx.enable_unmountable {
        let _ = kernel_notify::send_unmountable(path);
    }

    ctx.stats.mounted();
    Ok(())
}

fn apply_symlink(node: &Node, wpath: &Path) -> Result<()> {
    let Some(module_path) = &node.module_path else {
        bail!("cannot mount root symlink {}: no module_path", wpath.display());
    };
    let target = std::fs::read_link(module_path)
        .with_context(|| format!("readlink {}", module_path.display()))?;
    std::os::unix::fs::symlink(&target, wpath)
        .with_context(|| format!("symlink {} -> {}", wpath.display(), target.display()))?;
    copy_selcon(module_path, wpath);
    Ok(())
}

fn setup_dir_tmpfs(path: &Path, wpath: &Path, node: &Node) -> Result<()> {
    mkdir_p(wpath)?;

    let donor: PathBuf = if path.exists() {
        path.to_path_buf()
    } else if let Some(module_path) = &node.module_path {
        module_path.clone()
    } else {
        bail!("no dir meta for {}: neither the live path nor a module_path exist", path.display());
    };

    let meta = donor.metadata().with_context(|| format!("stat {}", donor.display()))?;
    chmod(wpath, Mode::from_raw_mode(meta.permissions().mode()))?;
    chown(
        wpath,
        Some(Uid::from_raw(meta.uid())),
        Some(Gid::from_raw(meta.gid())),
    )?;
    copy_selcon(&donor, wpath);
    Ok(())
}

fn apply_directory(ctx: &MagicMount, path: &Path, wpath: &Path, mut node: Node, has_tmpfs: bool) -> Result<()> {
    let mut create_tmp = !has_tmpfs && node.replace && node.module_path.is_some();
    if !has_tmpfs && !create_tmp {
        create_tmp = need_tmpfs(&mut node, path);
    }
    let now_tmp = has_tmpfs || create_tmp;

    if now_tmp {
        setup_dir_tmpfs(path, wpath, &node)?;
    }
    if create_tmp {
        mount_bind(wpath, wpath).with_context(|| format!("self-bind {}", wpath.display()))?;
    }

    if path.exists() && !node.replace {
        let entries = path.read_dir().with_context(|| format!("readdir {}", path.display()))?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();

            let result = match node.children.remove(&name) {
                Some(child) if child.skip => continue,
                Some(child) => {
                    let module_name = module_name_for(&child, &node.module_name);
                    apply_node(ctx, path, wpath, child, now_tmp)
                        .inspect_err(|e| record_child_failure(ctx, path, &name, module_name.as_deref(), e))
                }
                None if now_tmp => mirror_entry(path, wpath, &name)
                    .inspect_err(|e| record_child_failure(ctx, path, &name, node.module_name.as_deref(), e)),
                None => Ok(()),
            };

            if result.is_err() && now_tmp {
                return result;
            }
        }
    }

    for (name, child) in std::mem::take(&mut node.children) {
        if child.skip {
            continue;
        }
        let module_name = module_name_for(&child, &node.module_name);
        if let Err(e) = apply_node(ctx, path, wpath, child, now_tmp) {
            record_child_failure(ctx, path, &name, module_name.as_deref(), &e);
            if now_tmp {
                return Err(e);
            }
        }
    }

    if create_tmp {
        if let Err(e) = mount_remount(wpath, MountFlags::RDONLY | MountFlags::BIND, "") {
            log::warn!("remount {} ro: {e}", wpath.display());
        }

        if let Err(e) = mount_move(wpath, path) {
            if let Some(mn) = &node.module_name {
                ctx.mark_failed(mn);
            }
            return Err(e).with_context(|| format!("move {} -> {}", wpath.display(), path.display()));
        }

        if let Err(e) = mount_change(path, MountPropagationFlags::PRIVATE) {
            log::warn!("mark {} private: {e}", path.display());
        }

        if ctx.enable_unmountable {
            let _ = kernel_notify::send_unmountable(path);
        }
    }

    ctx.stats.mounted();
    Ok(())
}

/// Realize `node` under real path `base/node.name`, working path
/// `wbase/node.name`, given whether an enclosing overlay is already active.
pub fn apply_node(ctx: &MagicMount, base: &Path, wbase: &Path, node: Node, has_tmpfs: bool) -> Result<()> {
    let path = base.join(&node.name);
    let wpath = wbase.join(&node.name);

    match node.kind {
        NodeKind::RegularFile => apply_regular(ctx, &path, &wpath, &node, has_tmpfs),
        NodeKind::Symlink => {
            apply_symlink(&node, &wpath)?;
            ctx.stats.mounted();
            Ok(())
        }
        NodeKind::Whiteout => {
            log::debug!("whiteout {}", path.display());
            ctx.stats.whiteout();
            Ok(())
        }
        NodeKind::Directory => apply_directory(ctx, &path, &wpath, node, has_tmpfs),
    }
}
