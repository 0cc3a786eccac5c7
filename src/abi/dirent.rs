//! Directory iteration in the foreign `struct dirent` layout.

use std::ffi::CStr;
use std::fs::ReadDir;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirEntryExt;
use std::path::Path;

use libc::{c_char, c_int};
use static_assertions::const_assert_eq;

use super::{paths, set_errno};

pub const DT_UNKNOWN: u8 = 0;
pub const DT_DIR: u8 = 4;
pub const DT_REG: u8 = 8;
pub const DT_LNK: u8 = 10;

#[repr(C)]
pub struct ForeignDirent {
    pub d_ino: u64,
    pub d_off: i64,
    pub d_reclen: u16,
    pub d_type: u8,
    pub d_name: [u8; 256],
}

const_assert_eq!(std::mem::offset_of!(ForeignDirent, d_reclen), 16);
const_assert_eq!(std::mem::offset_of!(ForeignDirent, d_type), 18);
const_assert_eq!(std::mem::offset_of!(ForeignDirent, d_name), 19);

impl ForeignDirent {
    fn empty() -> Self {
        Self {
            d_ino: 0,
            d_off: 0,
            d_reclen: std::mem::size_of::<Self>() as u16,
            d_type: DT_UNKNOWN,
            d_name: [0; 256],
        }
    }

    pub fn name(&self) -> &[u8] {
        let len = self.d_name.iter().position(|b| *b == 0).unwrap_or(self.d_name.len());
        &self.d_name[..len]
    }
}

/// What the image holds as a `DIR *`.
pub struct DirStream {
    entries: ReadDir,
    current: ForeignDirent,
    position: i64,
    finished: bool,
}

impl DirStream {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            entries: std::fs::read_dir(path)?,
            current: ForeignDirent::empty(),
            position: 0,
            finished: false,
        })
    }

    /// Fills the stream's entry buffer with the next entry. Once the
    /// directory is exhausted every further call returns `None`.
    pub fn next_entry(&mut self) -> Option<&ForeignDirent> {
        if self.finished {
            return None;
        }
        let entry = loop {
            match self.entries.next() {
                Some(Ok(entry)) => break entry,
                // entries that vanish mid-iteration are skipped
                Some(Err(_)) => continue,
                None => {
                    self.finished = true;
                    return None;
                }
            }
        };

        let d_type = match entry.file_type() {
            Ok(ft) if ft.is_dir() => DT_DIR,
            Ok(ft) if ft.is_file() => DT_REG,
            Ok(ft) if ft.is_symlink() => DT_LNK,
            _ => DT_UNKNOWN,
        };
        let name = entry.file_name();
        let name = name.as_bytes();
        let len = name.len().min(255);

        self.position += 1;
        let current = &mut self.current;
        current.d_ino = entry.ino();
        current.d_off = self.position;
        current.d_type = d_type;
        current.d_name = [0; 256];
        current.d_name[..len].copy_from_slice(&name[..len]);
        Some(&self.current)
    }
}

pub unsafe extern "C" fn opendir(path: *const c_char) -> *mut DirStream {
    let Some(path) = (unsafe { paths().rewrite_raw(path) }) else {
        set_errno(libc::EFAULT);
        return std::ptr::null_mut();
    };
    let path = Path::new(std::ffi::OsStr::from_bytes(path.as_bytes()));
    match DirStream::open(path) {
        Ok(stream) => Box::into_raw(Box::new(stream)),
        Err(err) => {
            set_errno(err.raw_os_error().unwrap_or(libc::ENOENT));
            std::ptr::null_mut()
        }
    }
}

pub unsafe extern "C" fn readdir(dir: *mut DirStream) -> *mut ForeignDirent {
    let Some(stream) = (unsafe { dir.as_mut() }) else {
        set_errno(libc::EBADF);
        return std::ptr::null_mut();
    };
    match stream.next_entry() {
        Some(entry) => entry as *const ForeignDirent as *mut ForeignDirent,
        None => std::ptr::null_mut(),
    }
}

pub unsafe extern "C" fn closedir(dir: *mut DirStream) -> c_int {
    if dir.is_null() {
        set_errno(libc::EBADF);
        return -1;
    }
    drop(unsafe { Box::from_raw(dir) });
    0
}

/// Name of an entry returned by [`readdir`].
pub fn entry_name(entry: &ForeignDirent) -> &CStr {
    CStr::from_bytes_until_nul(&entry.d_name).unwrap_or(c"")
}
