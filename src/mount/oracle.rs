// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The tmpfs-need oracle: decides, per directory, whether a tmpfs overlay is
// mandatory because at least one child requires a "type divergence" from
// what already exists on the live filesystem.

use std::path::Path;

use crate::mount::node::{Node, NodeKind};

fn child_needs_divergence(kind: NodeKind, real_child_path: &Path) -> bool {
    match kind {
        NodeKind::Symlink => true,
        NodeKind::Whiteout => real_child_path.symlink_metadata().is_ok(),
        NodeKind::RegularFile | NodeKind::Directory => match real_child_path.symlink_metadata() {
            Ok(meta) => match NodeKind::from_file_type(meta.file_type()) {
                Some(live_kind) => live_kind != kind || live_kind == NodeKind::Symlink,
                None => true,
            },
            Err(_) => true,
        },
    }
}

/// Scan `node`'s children against the live directory at `real_path`. Returns
/// `true` if any child forces a tmpfs overlay. Children that need one but
/// can't get one (no `module_path` on `node` to carve tmpfs metadata from)
/// are marked `skip` in place and otherwise ignored by the scan.
pub fn need_tmpfs(node: &mut Node, real_path: &Path) -> bool {
    let mut needed = false;

    for (name, child) in node.children.iter_mut() {
        let real_child_path = real_path.join(name);
        if !child_needs_divergence(child.kind, &real_child_path) {
            continue;
        }

        if node.module_path.is_none() {
            log::error!(
                "cannot create tmpfs on {} to host child {name}, skipping",
                real_path.display()
            );
            child.skip = true;
            continue;
        }

        needed = true;
    }

    needed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::node::Node;
    use std::path::PathBuf;

    #[test]
    fn symlink_child_always_forces_tmpfs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut node = Node::new_dir("");
        node.module_path = Some(tmp.path().to_path_buf());
        node.children.insert(
            "link".into(),
            Node::leaf("link", NodeKind::Symlink, PathBuf::from("/mod/link"), "m"),
        );
        assert!(need_tmpfs(&mut node, tmp.path()));
    }

    #[test]
    fn whiteout_without_a_live_target_does_not_force_tmpfs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut node = Node::new_dir("");
        node.module_path = Some(tmp.path().to_path_buf());
        node.children.insert(
            "gone".into(),
            Node::leaf("gone", NodeKind::Whiteout, PathBuf::from("/mod/gone"), "m"),
        );
        assert!(!need_tmpfs(&mut node, tmp.path()));
    }

    #[test]
    fn whiteout_with_a_live_target_forces_tmpfs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("gone"), "x").unwrap();
        let mut node = Node::new_dir("");
        node.module_path = Some(tmp.path().to_path_buf());
        node.children.insert(
            "gone".into(),
            Node::leaf("gone", NodeKind::Whiteout, PathBuf::from("/mod/gone"), "m"),
        );
        assert!(need_tmpfs(&mut node, tmp.path()));
    }

    #[test]
    fn regular_child_whose_live_counterpart_is_a_dir_forces_tmpfs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("thing")).unwrap();
        let mut node = Node::new_dir("");
        node.module_path = Some(tmp.path().to_path_buf());
        node.children.insert(
            "thing".into(),
            Node::leaf("thing", NodeKind::RegularFile, PathBuf::from("/mod/thing"), "m"),
        );
        assert!(need_tmpfs(&mut node, tmp.path()));
    }

    #[test]
    fn matching_regular_child_does_not_force_tmpfs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("thing"), "x").unwrap();
        let mut node = Node::new_dir("");
        node.module_path = Some(tmp.path().to_path_buf());
        node.children.insert(
            "thing".into(),
            Node::leaf("thing", NodeKind::RegularFile, PathBuf::from("/mod/thing"), "m"),
        );
        assert!(!need_tmpfs(&mut node, tmp.path()));
    }

    #[test]
    fn needed_child_without_parent_module_path_is_skipped_not_forced() {
        let tmp = tempfile::tempdir().unwrap();
        // Parent node has no module_path to carve tmpfs metadata from, so a
        // child that would otherwise force tmpfs is skipped instead.
        let mut node = Node::new_dir("");
        node.children.insert(
            "new_thing".into(),
            Node::leaf("new_thing", NodeKind::RegularFile, PathBuf::from("/mod/new_thing"), "m"),
        );
        assert!(!need_tmpfs(&mut node, tmp.path()));
        assert!(node.children["new_thing"].skip);
    }

    #[test]
    fn other_children_still_force_tmpfs_when_one_child_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut node = Node::new_dir("");
        // No module_path: the symlink child below still wants tmpfs but gets
        // skipped, while a module-owned sibling can still force it directly.
        node.children.insert(
            "link".into(),
            Node::leaf("link", NodeKind::Symlink, PathBuf::from("/mod/link"), "m"),
        );
        assert!(!need_tmpfs(&mut node, tmp.path()));
        assert!(node.children["link"].skip);
    }
}
