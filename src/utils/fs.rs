// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
#[cfg(any(target_os = "linux", target_os = "android"))]
use extattr::{lgetxattr, lsetxattr, Flags as XattrFlags};

const SELINUX_XATTR: &str = "security.selinux";

/// Join `name` onto `parent`. A thin wrapper kept distinct from `Path::join`
/// so callers read the same way the rest of the mount tree walks do.
pub fn path_join<P: AsRef<Path>>(parent: P, name: impl AsRef<Path>) -> PathBuf {
    parent.as_ref().join(name)
}

pub fn path_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().symlink_metadata().is_ok()
}

/// Recursive mkdir; tolerates the directory already existing.
pub fn mkdir_p<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn lgetfilecon<P: AsRef<Path>>(path: P) -> Result<String> {
    let con = lgetxattr(path.as_ref(), SELINUX_XATTR).with_context(|| {
        format!(
            "failed to read SELinux context for {}",
            path.as_ref().display()
        )
    })?;
    Ok(String::from_utf8_lossy(&con).trim_matches('\0').to_string())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn lgetfilecon<P: AsRef<Path>>(_path: P) -> Result<String> {
    anyhow::bail!("SELinux contexts are not available on this platform")
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn lsetfilecon<P: AsRef<Path>>(path: P, con: &str) -> Result<()> {
    lsetxattr(path.as_ref(), SELINUX_XATTR, con.as_bytes(), XattrFlags::empty())
        .with_context(|| format!("failed to set SELinux context on {}", path.as_ref().display()))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn lsetfilecon<P: AsRef<Path>>(_path: P, _con: &str) -> Result<()> {
    Ok(())
}

/// Best-effort SELinux context clone. Failures are logged, never propagated:
/// a missing xattr facility must not abort an otherwise-successful mount.
pub fn copy_selcon<S: AsRef<Path>, D: AsRef<Path>>(src: S, dst: D) {
    match lgetfilecon(src.as_ref()) {
        Ok(con) => {
            if let Err(e) = lsetfilecon(dst.as_ref(), &con) {
                log::debug!("copy_selcon {} -> {}: {e:#}", src.as_ref().display(), dst.as_ref().display());
            }
        }
        Err(e) => log::debug!("copy_selcon: read context of {}: {e:#}", src.as_ref().display()),
    }
}

/// Write `content` to `path` via a temp file + rename so readers never see a
/// half-written file (used for the failed-modules registry).
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    mkdir_p(dir)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp = dir.join(format!(".{}_{now}.tmp", std::process::id()));

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .with_context(|| format!("create temp file {}", tmp.display()))?;
        file.write_all(content)?;
    }

    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_p_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        mkdir_p(&nested).unwrap();
        assert!(nested.is_dir());
        // idempotent
        mkdir_p(&nested).unwrap();
    }

    #[test]
    fn path_exists_reports_dangling_symlinks_as_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("missing");
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        assert!(path_exists(&link));
        assert!(!path_exists(&target));
    }

    #[test]
    fn atomic_write_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub/dir/file.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }
}
