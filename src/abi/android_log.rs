//! `liblog` entry points forwarded into the `log` facade under target
//! `image`.

use std::ffi::CStr;

use libc::{c_char, c_int};
use log::Level;

use super::valist::RawVaList;

pub const TARGET: &str = "image";

unsafe extern "C" {
    #[link_name = "vsnprintf"]
    fn host_vsnprintf(buf: *mut c_char, size: usize, format: *const c_char, args: RawVaList) -> c_int;
}

/// Android priority to `log` level. Priorities below VERBOSE are
/// `UNKNOWN`/`DEFAULT` and are logged at debug.
pub fn level(priority: c_int) -> Level {
    match priority {
        2 => Level::Trace,
        3 => Level::Debug,
        4 => Level::Info,
        5 => Level::Warn,
        6 | 7 => Level::Error,
        _ => Level::Debug,
    }
}

unsafe fn text(s: *const c_char) -> std::borrow::Cow<'static, str> {
    if s.is_null() {
        return "".into();
    }
    unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned().into()
}

fn emit(priority: c_int, tag: &str, message: &str) {
    log::log!(target: TARGET, level(priority), "[{tag}] {}", message.trim_end());
}

/// Logs the raw format string; the variadic arguments are not read.
pub unsafe extern "C" fn __android_log_print(priority: c_int, tag: *const c_char, format: *const c_char) -> c_int {
    let (tag, format) = unsafe { (text(tag), text(format)) };
    emit(priority, &tag, &format);
    0
}

pub unsafe extern "C" fn __android_log_write(priority: c_int, tag: *const c_char, message: *const c_char) -> c_int {
    let (tag, message) = unsafe { (text(tag), text(message)) };
    emit(priority, &tag, &message);
    0
}

pub unsafe extern "C" fn __android_log_vprint(
    priority: c_int,
    tag: *const c_char,
    format: *const c_char,
    args: RawVaList,
) -> c_int {
    if format.is_null() {
        return -1;
    }
    let mut buf = [0 as c_char; 1024];
    let written = unsafe { host_vsnprintf(buf.as_mut_ptr(), buf.len(), format, args) };
    if written < 0 {
        return written;
    }
    let message = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy();
    let tag = unsafe { text(tag) };
    emit(priority, &tag, &message);
    written
}
