// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The mirror engine: reproduces a real directory's children into a tmpfs
// working path, via bind mounts and symlink clones, never data copies.

use std::{
    fs::{self, read_dir, read_link},
    os::unix::fs::{symlink, MetadataExt},
    path::Path,
};

use anyhow::{Context, Result};
use rustix::{
    fs::{chmod, chown, Gid, Mode, Uid},
    mount::mount_bind,
};

use crate::utils::fs::copy_selcon;

fn clone_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = read_link(src).with_context(|| format!("readlink {}", src.display()))?;
    symlink(&target, dst).with_context(|| format!("symlink {} -> {}", dst.display(), target.display()))?;
    copy_selcon(src, dst);
    Ok(())
}

/// Reproduce `real_parent/name` at `work_parent/name`. A missing source is a
/// non-fatal warning, not an error: the enclosing directory still has every
/// other sibling to mirror.
pub fn mirror_entry(real_parent: &Path, work_parent: &Path, name: &str) -> Result<()> {
    let src = real_parent.join(name);
    let dst = work_parent.join(name);

    let meta = match src.symlink_metadata() {
        Ok(m) => m,
        Err(e) => {
            log::warn!("lstat {}: {e}", src.display());
            return Ok(());
        }
    };

    let file_type = meta.file_type();
    if file_type.is_file() {
        fs::File::create(&dst).with_context(|| format!("create {}", dst.display()))?;
        mount_bind(&src, &dst).with_context(|| format!("bind {} -> {}", src.display(), dst.display()))?;
    } else if file_type.is_dir() {
        fs::create_dir(&dst).with_context(|| format!("mkdir {}", dst.display()))?;
        chmod(&dst, Mode::from_raw_mode(meta.mode()))?;
        chown(&dst, Some(Uid::from_raw(meta.uid())), Some(Gid::from_raw(meta.gid())))?;
        copy_selcon(&src, &dst);

        for entry in read_dir(&src).with_context(|| format!("readdir {}", src.display()))?.flatten() {
            let child_name = entry.file_name().to_string_lossy().to_string();
            mirror_entry(&src, &dst, &child_name)
                .with_context(|| format!("mirror {}/{}", src.display(), child_name))?;
        }
    } else if file_type.is_symlink() {
        clone_symlink(&src, &dst)?;
    }
    // other types (devices, fifos, sockets) are ignored: a module shadow
    // tree has no business recreating those.

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn missing_source_is_a_no_op_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&real).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        mirror_entry(&real, &work, "does_not_exist").unwrap();
        assert!(!work.join("does_not_exist").exists());
    }

    #[test]
    fn symlink_is_cloned_with_same_target() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&real).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        std::os::unix::fs::symlink("/etc/hosts", real.join("link")).unwrap();

        mirror_entry(&real, &work, "link").unwrap();
        let cloned_target = std::fs::read_link(work.join("link")).unwrap();
        assert_eq!(cloned_target, Path::new("/etc/hosts"));
    }

    #[test]
    fn directory_is_mirrored_recursively_with_matching_permissions() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(real.join("sub")).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        std::fs::set_permissions(real.join("sub"), std::fs::Permissions::from_mode(0o750)).unwrap();

        // Only the directory shell is mirrored here (no bind mount for the
        // empty "sub" dir itself); files under it would bind-mount, which
        // needs privilege this test doesn't have, so "sub" stays empty.
        mirror_entry(&real, &work, "sub").unwrap();
        let mirrored = work.join("sub");
        assert!(mirrored.is_dir());
        let mode = std::fs::metadata(&mirrored).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }
}
