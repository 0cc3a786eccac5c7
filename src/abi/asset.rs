//! `AAssetManager` over plain files under the data root.

#![allow(non_snake_case)]

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use libc::{c_char, c_int, c_void, off_t, size_t};
use log::debug;

use super::paths;

pub struct Asset {
    file: File,
    length: u64,
}

impl Asset {
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self { file, length })
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }

    /// Returns the new position, or `None` when it would fall before the
    /// start of the asset.
    pub fn seek(&mut self, offset: i64, whence: c_int) -> Option<u64> {
        let target = match whence {
            libc::SEEK_SET => SeekFrom::Start(u64::try_from(offset).ok()?),
            libc::SEEK_CUR => SeekFrom::Current(offset),
            libc::SEEK_END => SeekFrom::End(offset),
            _ => return None,
        };
        self.file.seek(target).ok()
    }
}

/// Names of the entries of one asset directory, handed out one at a time.
pub struct AssetDir {
    names: Vec<CString>,
    next: usize,
}

impl AssetDir {
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                if let Ok(name) = CString::new(entry.file_name().as_bytes()) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(Self { names, next: 0 })
    }

    pub fn next_name(&mut self) -> Option<&CStr> {
        let name = self.names.get(self.next)?;
        self.next += 1;
        Some(name.as_c_str())
    }
}

unsafe fn asset_path(name: *const c_char) -> Option<PathBuf> {
    if name.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(name) }.to_bytes();
    let mut path = PathBuf::from(paths().data_root());
    path.push(std::ffi::OsStr::from_bytes(name.strip_prefix(b"/").unwrap_or(name)));
    Some(path)
}

/// The manager object handed out by `AAssetManager_fromJava`.
pub extern "C" fn AAssetManager_fromJava(_env: *mut c_void, _manager: *mut c_void) -> *mut c_void {
    1 as *mut c_void
}

pub unsafe extern "C" fn AAssetManager_open(
    _manager: *mut c_void,
    name: *const c_char,
    _mode: c_int,
) -> *mut Asset {
    let Some(path) = (unsafe { asset_path(name) }) else {
        return std::ptr::null_mut();
    };
    match Asset::open(path.clone()) {
        Ok(asset) => Box::into_raw(Box::new(asset)),
        Err(err) => {
            debug!("asset {} unavailable: {err}", path.display());
            std::ptr::null_mut()
        }
    }
}

/// A single read never reports more bytes than the return type can hold.
fn read_len(count: size_t) -> usize {
    count.min(c_int::MAX as size_t)
}

pub unsafe extern "C" fn AAsset_read(asset: *mut Asset, buf: *mut c_void, count: size_t) -> c_int {
    let Some(asset) = (unsafe { asset.as_mut() }) else {
        return -1;
    };
    if buf.is_null() {
        return -1;
    }
    let buf = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, read_len(count)) };
    match asset.read(buf) {
        Ok(n) => n as c_int,
        Err(_) => -1,
    }
}

pub unsafe extern "C" fn AAsset_seek(asset: *mut Asset, offset: off_t, whence: c_int) -> off_t {
    unsafe { asset.as_mut() }
        .and_then(|asset| asset.seek(offset as i64, whence))
        .map(|pos| pos as off_t)
        .unwrap_or(-1)
}

pub unsafe extern "C" fn AAsset_getLength(asset: *mut Asset) -> off_t {
    unsafe { asset.as_ref() }.map(|asset| asset.length() as off_t).unwrap_or(0)
}

pub unsafe extern "C" fn AAsset_getRemainingLength(asset: *mut Asset) -> off_t {
    let Some(asset) = (unsafe { asset.as_mut() }) else {
        return 0;
    };
    let length = asset.length();
    let pos = asset.seek(0, libc::SEEK_CUR).unwrap_or(length);
    length.saturating_sub(pos) as off_t
}

pub unsafe extern "C" fn AAsset_close(asset: *mut Asset) {
    if !asset.is_null() {
        drop(unsafe { Box::from_raw(asset) });
    }
}

pub unsafe extern "C" fn AAssetManager_openDir(_manager: *mut c_void, dir: *const c_char) -> *mut AssetDir {
    let Some(path) = (unsafe { asset_path(dir) }) else {
        return std::ptr::null_mut();
    };
    match AssetDir::open(path) {
        Ok(dir) => Box::into_raw(Box::new(dir)),
        Err(_) => std::ptr::null_mut(),
    }
}

pub unsafe extern "C" fn AAssetDir_getNextFileName(dir: *mut AssetDir) -> *const c_char {
    unsafe { dir.as_mut() }
        .and_then(AssetDir::next_name)
        .map(CStr::as_ptr)
        .unwrap_or(std::ptr::null())
}

pub unsafe extern "C" fn AAssetDir_close(dir: *mut AssetDir) {
    if !dir.is_null() {
        drop(unsafe { Box::from_raw(dir) });
    }
}

pub unsafe extern "C" fn AAsset_getLength64(asset: *mut Asset) -> i64 {
    unsafe { AAsset_getLength(asset) as i64 }
}
