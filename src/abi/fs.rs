//! Filesystem calls whose path arguments are remapped under the data root.

use std::ffi::CString;

use libc::{c_char, c_int, c_void, mode_t, size_t, FILE};

use super::{paths, set_errno};

/// Runs `f` on the rewritten form of `path`, or fails with `EFAULT` when
/// the image passed a null pointer.
unsafe fn remapped<T>(path: *const c_char, failure: T, f: impl FnOnce(&CString) -> T) -> T {
    match unsafe { paths().rewrite_raw(path) } {
        Some(path) => f(&path),
        None => {
            set_errno(libc::EFAULT);
            failure
        }
    }
}

pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    unsafe { remapped(path, -1, |p| libc::open(p.as_ptr(), flags, mode as libc::c_uint)) }
}

pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    unsafe { remapped(path, std::ptr::null_mut(), |p| libc::fopen(p.as_ptr(), mode)) }
}

pub unsafe extern "C" fn access(path: *const c_char, mode: c_int) -> c_int {
    unsafe { remapped(path, -1, |p| libc::access(p.as_ptr(), mode)) }
}

pub unsafe extern "C" fn mkdir(path: *const c_char, mode: mode_t) -> c_int {
    unsafe { remapped(path, -1, |p| libc::mkdir(p.as_ptr(), mode)) }
}

pub unsafe extern "C" fn rmdir(path: *const c_char) -> c_int {
    unsafe { remapped(path, -1, |p| libc::rmdir(p.as_ptr())) }
}

pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    unsafe { remapped(path, -1, |p| libc::unlink(p.as_ptr())) }
}

pub unsafe extern "C" fn remove(path: *const c_char) -> c_int {
    unsafe { remapped(path, -1, |p| libc::remove(p.as_ptr())) }
}

pub unsafe extern "C" fn rename(from: *const c_char, to: *const c_char) -> c_int {
    unsafe {
        remapped(from, -1, |from| {
            remapped(to, -1, |to| libc::rename(from.as_ptr(), to.as_ptr()))
        })
    }
}

/// Reports the data root as the working directory.
pub unsafe extern "C" fn getcwd(buf: *mut c_char, size: size_t) -> *mut c_char {
    let root = paths().data_root().as_bytes();
    if buf.is_null() || size <= root.len() {
        set_errno(libc::ERANGE);
        return std::ptr::null_mut();
    }
    unsafe {
        std::ptr::copy_nonoverlapping(root.as_ptr(), buf as *mut u8, root.len());
        *buf.add(root.len()) = 0;
    }
    buf
}

pub extern "C" fn chdir(_path: *const c_char) -> c_int {
    0
}

#[cfg(not(target_arch = "arm"))]
mod stat_layout {
    //! 64-bit bionic and the host share the kernel's `struct stat`.

    use libc::{c_char, c_int, c_void};

    pub unsafe fn stat(path: *const c_char, out: *mut c_void) -> c_int {
        unsafe { libc::stat(path, out as *mut libc::stat) }
    }

    pub unsafe fn lstat(path: *const c_char, out: *mut c_void) -> c_int {
        unsafe { libc::lstat(path, out as *mut libc::stat) }
    }

    pub unsafe fn fstat(fd: c_int, out: *mut c_void) -> c_int {
        unsafe { libc::fstat(fd, out as *mut libc::stat) }
    }
}

#[cfg(target_arch = "arm")]
mod stat_layout {
    //! 32-bit bionic uses the packed `stat64` layout for `struct stat`.

    use libc::{c_char, c_int, c_void};
    use static_assertions::const_assert_eq;

    #[repr(C)]
    #[derive(Default)]
    pub struct BionicStat {
        pub st_dev: u64,
        pub __pad0: [u8; 4],
        pub __st_ino: u32,
        pub st_mode: u32,
        pub st_nlink: u32,
        pub st_uid: u32,
        pub st_gid: u32,
        pub st_rdev: u64,
        pub __pad3: [u8; 4],
        pub st_size: i64,
        pub st_blksize: u32,
        pub st_blocks: u64,
        pub st_atime: i32,
        pub st_atime_nsec: u32,
        pub st_mtime: i32,
        pub st_mtime_nsec: u32,
        pub st_ctime: i32,
        pub st_ctime_nsec: u32,
        pub st_ino: u64,
    }

    const_assert_eq!(std::mem::offset_of!(BionicStat, st_size), 48);
    const_assert_eq!(std::mem::offset_of!(BionicStat, st_ino), 96);
    const_assert_eq!(std::mem::size_of::<BionicStat>(), 104);

    fn convert(host: &libc::stat64) -> BionicStat {
        BionicStat {
            st_dev: host.st_dev as u64,
            __st_ino: host.st_ino as u32,
            st_mode: host.st_mode as u32,
            st_nlink: host.st_nlink as u32,
            st_uid: host.st_uid,
            st_gid: host.st_gid,
            st_rdev: host.st_rdev as u64,
            st_size: host.st_size,
            st_blksize: host.st_blksize as u32,
            st_blocks: host.st_blocks as u64,
            st_atime: host.st_atime as i32,
            st_atime_nsec: host.st_atime_nsec as u32,
            st_mtime: host.st_mtime as i32,
            st_mtime_nsec: host.st_mtime_nsec as u32,
            st_ctime: host.st_ctime as i32,
            st_ctime_nsec: host.st_ctime_nsec as u32,
            st_ino: host.st_ino as u64,
            ..Default::default()
        }
    }

    unsafe fn fill(rc: c_int, host: &libc::stat64, out: *mut c_void) -> c_int {
        if rc == 0 && !out.is_null() {
            unsafe { (out as *mut BionicStat).write_unaligned(convert(host)) };
        }
        rc
    }

    pub unsafe fn stat(path: *const c_char, out: *mut c_void) -> c_int {
        unsafe {
            let mut host: libc::stat64 = std::mem::zeroed();
            let rc = libc::stat64(path, &mut host);
            fill(rc, &host, out)
        }
    }

    pub unsafe fn lstat(path: *const c_char, out: *mut c_void) -> c_int {
        unsafe {
            let mut host: libc::stat64 = std::mem::zeroed();
            let rc = libc::lstat64(path, &mut host);
            fill(rc, &host, out)
        }
    }

    pub unsafe fn fstat(fd: c_int, out: *mut c_void) -> c_int {
        unsafe {
            let mut host: libc::stat64 = std::mem::zeroed();
            let rc = libc::fstat64(fd, &mut host);
            fill(rc, &host, out)
        }
    }
}

pub unsafe extern "C" fn stat(path: *const c_char, out: *mut c_void) -> c_int {
    unsafe { remapped(path, -1, |p| stat_layout::stat(p.as_ptr(), out)) }
}

pub unsafe extern "C" fn lstat(path: *const c_char, out: *mut c_void) -> c_int {
    unsafe { remapped(path, -1, |p| stat_layout::lstat(p.as_ptr(), out)) }
}

pub unsafe extern "C" fn fstat(fd: c_int, out: *mut c_void) -> c_int {
    unsafe { stat_layout::fstat(fd, out) }
}
