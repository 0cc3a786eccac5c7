//! `dlfcn` over the process symbol table. No second image is ever loaded.

use std::ffi::CStr;

use libc::{c_char, c_int, c_void};
use log::{debug, warn};

static PSEUDO_HANDLE: u8 = 0;

/// Looks `name` up in the installed table, then in the graphics provider.
pub fn lookup(name: &str) -> Option<usize> {
    let ctx = super::context()?;
    ctx.table.resolve(name).or_else(|| ctx.graphics.proc_address(name))
}

/// Every library name yields the same non-null handle.
pub unsafe extern "C" fn dlopen(filename: *const c_char, _flags: c_int) -> *mut c_void {
    if !filename.is_null() {
        debug!("dlopen({:?}) answered by the symbol table", unsafe { CStr::from_ptr(filename) });
    }
    &PSEUDO_HANDLE as *const u8 as *mut c_void
}

pub unsafe extern "C" fn dlsym(_handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    if symbol.is_null() {
        return std::ptr::null_mut();
    }
    let name = unsafe { CStr::from_ptr(symbol) }.to_string_lossy();
    match lookup(&name) {
        Some(address) => address as *mut c_void,
        None => {
            warn!("dlsym: {name} not found");
            std::ptr::null_mut()
        }
    }
}

pub extern "C" fn dlclose(_handle: *mut c_void) -> c_int {
    0
}

pub extern "C" fn dlerror() -> *const c_char {
    std::ptr::null()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_stable_and_non_null() {
        let a = unsafe { dlopen(c"libGLESv2.so".as_ptr(), 0) };
        let b = unsafe { dlopen(std::ptr::null(), 0) };
        assert!(!a.is_null());
        assert_eq!(a, b);
        assert_eq!(dlclose(a), 0);
        assert!(dlerror().is_null());
    }

    #[test]
    fn null_symbol_name_yields_null() {
        assert!(unsafe { dlsym(std::ptr::null_mut(), std::ptr::null()) }.is_null());
    }
}
