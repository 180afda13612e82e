// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
//
// The kernel-notify shim: an out-of-band "this path now carries a
// module-provided mount" message to the host's privileged kernel module, so
// later user attempts to unmount it can be resisted. Interface-only per the
// design; this implementation speaks the ioctl protocol the wider family of
// root-management kernel modules expose.

#[cfg(any(target_os = "linux", target_os = "android"))]
use std::{ffi::CString, os::fd::RawFd, path::Path, sync::OnceLock};

#[cfg(any(target_os = "linux", target_os = "android"))]
use anyhow::Result;

#[cfg(any(target_os = "linux", target_os = "android"))]
const DRIVER_INSTALL_MAGIC1: u32 = 0xDEAD_BEEF;
#[cfg(any(target_os = "linux", target_os = "android"))]
const DRIVER_INSTALL_MAGIC2: u32 = 0xCAFE_BABE;
#[cfg(any(target_os = "linux", target_os = "android"))]
const IOCTL_ADD_TRY_UMOUNT: u32 = 0x4000_4b12;

#[cfg(any(target_os = "linux", target_os = "android"))]
static DRIVER_FD: OnceLock<RawFd> = OnceLock::new();

#[cfg(any(target_os = "linux", target_os = "android"))]
#[repr(C)]
struct AddTryUmount {
    arg: u64,
    flags: u32,
    mode: u8,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn driver_fd() -> RawFd {
    *DRIVER_FD.get_or_init(|| {
        let mut fd: RawFd = -1;
        unsafe {
            libc::syscall(
                libc::SYS_reboot,
                DRIVER_INSTALL_MAGIC1,
                DRIVER_INSTALL_MAGIC2,
                0,
                &mut fd,
            );
        }
        fd
    })
}

/// Notify the kernel module that `path` now carries a module-provided mount.
/// Idempotent; failures are logged and ignored, matching the design's
/// "best-effort, never block a mount on this" stance.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn send_unmountable<P: AsRef<Path>>(path: P) -> Result<()> {
    use rustix::path::Arg;

    let c_path = CString::new(path.as_ref().as_str()?)?;
    let cmd = AddTryUmount {
        arg: c_path.as_ptr() as u64,
        flags: 2,
        mode: 1,
    };

    let fd = driver_fd();
    if fd < 0 {
        return Ok(());
    }

    unsafe {
        #[cfg(target_env = "gnu")]
        let ret = libc::ioctl(fd, IOCTL_ADD_TRY_UMOUNT as u64, &cmd);
        #[cfg(not(target_env = "gnu"))]
        let ret = libc::ioctl(fd, IOCTL_ADD_TRY_UMOUNT as i32, &cmd);

        if ret < 0 {
            log::debug!(
                "send_unmountable({}): {}",
                path.as_ref().display(),
                std::io::Error::last_os_error()
            );
        }
    }

    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn send_unmountable<P: AsRef<std::path::Path>>(_path: P) -> anyhow::Result<()> {
    Ok(())
}
