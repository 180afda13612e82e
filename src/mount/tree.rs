// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The mount-tree builder: scans the module storage directory and produces a
// single merged `Node` rooted at "/". Interface-wise this is an external
// collaborator (per the design, only its contract is fixed); this crate
// still carries a concrete implementation so `magic_mount` is runnable
// end-to-end.

use std::{
    fs::DirEntry,
    os::unix::fs::{FileTypeExt, MetadataExt},
    path::{Path, PathBuf},
};

use anyhow::Result;
use rayon::prelude::*;

use crate::{
    defs,
    mount::node::{Node, NodeKind},
};

fn is_whiteout(entry: &DirEntry) -> bool {
    entry
        .metadata()
        .map(|m| m.file_type().is_char_device() && m.rdev() == 0)
        .unwrap_or(false)
}

fn dir_is_replace(path: &Path) -> bool {
    if path.join(defs::REPLACE_DIR_FILE_NAME).exists() {
        return true;
    }
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if let Ok(v) = extattr::lgetxattr(path, defs::REPLACE_DIR_XATTR) {
            return v == b"y";
        }
    }
    false
}

/// Recursively turn a module's on-disk shadow directory into `Node`s,
/// inserting them as children of `parent`.
fn collect_module_files(parent: &mut Node, dir: &Path, module_name: &str) -> Result<()> {
    let Ok(entries) = dir.read_dir() else {
        return Ok(());
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();

        let kind = if is_whiteout(&entry) {
            NodeKind::Whiteout
        } else {
            match entry.file_type() {
                Ok(ft) => match NodeKind::from_file_type(ft) {
                    Some(k) => k,
                    None => continue,
                },
                Err(_) => continue,
            }
        };

        if kind == NodeKind::Directory {
            let child = parent
                .children
                .entry(name.clone())
                .or_insert_with(|| Node::new_dir(&name));
            child.kind = NodeKind::Directory;
            child.module_path = Some(path.clone());
            child.module_name = Some(module_name.to_string());
            child.replace = dir_is_replace(&path);
            collect_module_files(child, &path, module_name)?;
        } else {
            parent
                .children
                .entry(name.clone())
                .or_insert_with(|| Node::leaf(&name, kind, path, module_name));
        }
    }

    Ok(())
}

/// Merge `addition` into `base`, first-writer-wins on leaf ownership: a path
/// already claimed by an earlier module keeps that module's content, but
/// unclaimed children beneath it are still adopted from the later module.
fn merge_first_wins(base: &mut Node, addition: Node) {
    if base.module_path.is_none() {
        base.module_path = addition.module_path;
        base.module_name = addition.module_name;
        base.kind = addition.kind;
        base.replace = addition.replace;
    }

    for (name, child) in addition.children {
        match base.children.remove(&name) {
            Some(mut existing) => {
                merge_first_wins(&mut existing, child);
                base.children.insert(name, existing);
            }
            None => {
                base.children.insert(name, child);
            }
        }
    }
}

fn module_is_disabled(module_dir: &Path) -> bool {
    module_dir.join(defs::DISABLE_FILE_NAME).exists()
        || module_dir.join(defs::REMOVE_FILE_NAME).exists()
        || module_dir.join(defs::SKIP_MOUNT_FILE_NAME).exists()
}

/// Build the `(root, system)` subtrees contributed by a single module.
fn process_module(module_dir: &Path, extra_partitions: &[String]) -> Result<(Node, Node)> {
    let mut root = Node::new_dir("");
    let mut system = Node::new_dir("system");

    if module_is_disabled(module_dir) {
        return Ok((root, system));
    }

    let module_name = module_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mod_system = module_dir.join("system");
    if mod_system.is_dir() {
        collect_module_files(&mut system, &mod_system, &module_name)?;
    }

    for partition in defs::ROOT_PARTITIONS {
        let mod_part = module_dir.join(partition);
        if mod_part.is_dir() {
            let node = system
                .children
                .entry(partition.to_string())
                .or_insert_with(|| Node::new_dir(partition));
            node.kind = NodeKind::Directory;
            node.module_path = Some(mod_part.clone());
            node.module_name = Some(module_name.clone());
            collect_module_files(node, &mod_part, &module_name)?;
        }
    }

    for partition in extra_partitions {
        if defs::ROOT_PARTITIONS.contains(&partition.as_str()) || partition == "system" {
            continue;
        }
        let mod_part = module_dir.join(partition);
        if mod_part.is_dir() {
            let node = root
                .children
                .entry(partition.clone())
                .or_insert_with(|| Node::new_dir(partition));
            node.kind = NodeKind::Directory;
            node.module_path = Some(mod_part.clone());
            node.module_name = Some(module_name.clone());
            collect_module_files(node, &mod_part, &module_name)?;
        }
    }

    Ok((root, system))
}

/// Scan `module_dir` for module subdirectories, in a fixed (alphabetical)
/// order, and merge them first-writer-wins into one tree rooted at "/".
/// Returns `None` if no module contributed anything.
pub fn build_mount_tree(module_dir: &Path, extra_partitions: &[String]) -> Result<Option<Node>> {
    if !module_dir.exists() {
        return Ok(None);
    }

    let mut module_dirs: Vec<PathBuf> = module_dir
        .read_dir()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    module_dirs.sort();

    // Each module's own subtree only reads that module's files, so the scan
    // itself can run in parallel; the fold that merges results in module
    // order is the serialization point that makes first-writer-wins exact.
    let per_module: Vec<(Node, Node)> = module_dirs
        .par_iter()
        .map(|dir| process_module(dir, extra_partitions))
        .collect::<Result<_>>()?;

    let mut final_root = Node::new_dir("");
    let mut final_system = Node::new_dir("system");

    for (root, system) in per_module {
        merge_first_wins(&mut final_root, root);
        merge_first_wins(&mut final_system, system);
    }

    let has_content = !final_root.children.is_empty() || !final_system.children.is_empty();
    if !has_content {
        return Ok(None);
    }

    final_root.children.insert("system".to_string(), final_system);
    Ok(Some(final_root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn first_module_wins_a_contested_path() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("modules");

        write_file(&modules.join("a_first/system/bin/tool"), "from a");
        write_file(&modules.join("z_second/system/bin/tool"), "from z");

        let tree = build_mount_tree(&modules, &[]).unwrap().unwrap();
        let system = tree.child("system").unwrap();
        let bin = system.child("bin").unwrap();
        let tool = bin.child("tool").unwrap();

        assert_eq!(tool.module_name.as_deref(), Some("a_first"));
    }

    #[test]
    fn disabled_module_contributes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("modules");
        write_file(&modules.join("modA/system/bin/tool"), "x");
        fs::write(modules.join("modA/disable"), "").unwrap();

        assert!(build_mount_tree(&modules, &[]).unwrap().is_none());
    }

    #[test]
    fn no_modules_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("modules");
        fs::create_dir_all(&modules).unwrap();
        assert!(build_mount_tree(&modules, &[]).unwrap().is_none());
    }

    #[test]
    fn unclaimed_sibling_adopted_from_later_module() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("modules");
        write_file(&modules.join("a_first/system/bin/tool_a"), "a");
        write_file(&modules.join("z_second/system/bin/tool_z"), "z");

        let tree = build_mount_tree(&modules, &[]).unwrap().unwrap();
        let bin = tree.child("system").unwrap().child("bin").unwrap();
        assert!(bin.child("tool_a").is_some());
        assert!(bin.child("tool_z").is_some());
    }
}
