use std::ffi::CStr;

use libc::{c_char, c_int};
use log::error;

/// Bionic's name for the errno location.
pub extern "C" fn __errno() -> *mut c_int {
    unsafe { libc::__errno_location() }
}

pub extern "C" fn abort() {
    error!("image called abort()");
    std::process::abort();
}

unsafe fn lossy(s: *const c_char) -> String {
    if s.is_null() {
        return String::from("?");
    }
    unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned()
}

/// Bionic's assertion failure handler.
pub unsafe extern "C" fn __assert2(
    file: *const c_char,
    line: c_int,
    function: *const c_char,
    expression: *const c_char,
) {
    let (file, function, expression) = unsafe { (lossy(file), lossy(function), lossy(expression)) };
    error!("{file}:{line}: {function}: assertion \"{expression}\" failed");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_location_is_the_host_one() {
        crate::abi::set_errno(libc::EPIPE);
        assert_eq!(unsafe { *__errno() }, libc::EPIPE);
        assert_eq!(__errno(), unsafe { libc::__errno_location() });
    }
}
