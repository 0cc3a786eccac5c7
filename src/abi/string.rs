//! String helpers bionic has and the host C library may not.

use libc::{c_char, c_int, size_t};
use log::error;

/// BSD `strlcpy`: copies at most `size - 1` bytes, always terminates when
/// `size > 0`, and returns the length of `src`.
pub unsafe extern "C" fn strlcpy(dst: *mut c_char, src: *const c_char, size: size_t) -> size_t {
    let len = unsafe { libc::strlen(src) };
    if size > 0 {
        let n = len.min(size - 1);
        unsafe {
            std::ptr::copy_nonoverlapping(src, dst, n);
            *dst.add(n) = 0;
        }
    }
    len
}

/// BSD `strlcat`: appends while keeping the result under `size` bytes and
/// returns the length it tried to create.
pub unsafe extern "C" fn strlcat(dst: *mut c_char, src: *const c_char, size: size_t) -> size_t {
    let src_len = unsafe { libc::strlen(src) };
    let dst_len = unsafe { libc::strnlen(dst, size) };
    if dst_len == size {
        return size + src_len;
    }
    let room = size - dst_len - 1;
    let n = src_len.min(room);
    unsafe {
        std::ptr::copy_nonoverlapping(src, dst.add(dst_len), n);
        *dst.add(dst_len + n) = 0;
    }
    dst_len + src_len
}

/// Fortified `strlen`: aborts when the string overruns its object.
pub unsafe extern "C" fn __strlen_chk(s: *const c_char, s_len: size_t) -> size_t {
    let len = unsafe { libc::strlen(s) };
    if len >= s_len {
        error!("strlen: prevented read past end of buffer ({len} >= {s_len})");
        std::process::abort();
    }
    len
}

/// XSI `strerror_r`, which is what bionic provides under that name.
pub unsafe extern "C" fn strerror_r(errnum: c_int, buf: *mut c_char, len: size_t) -> c_int {
    unsafe { libc::strerror_r(errnum, buf, len) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn strlcpy_truncates_and_reports_source_length() {
        let mut buf = [0x7f as c_char; 4];
        let n = unsafe { strlcpy(buf.as_mut_ptr(), c"texture".as_ptr(), buf.len()) };
        assert_eq!(n, 7);
        assert_eq!(unsafe { CStr::from_ptr(buf.as_ptr()) }, c"tex");

        let mut untouched = [0x7f as c_char; 1];
        assert_eq!(unsafe { strlcpy(untouched.as_mut_ptr(), c"ab".as_ptr(), 0) }, 2);
        assert_eq!(untouched[0], 0x7f);
    }

    #[test]
    fn strlcat_appends_within_bounds() {
        let mut buf = [0 as c_char; 8];
        unsafe {
            strlcpy(buf.as_mut_ptr(), c"abc".as_ptr(), buf.len());
            assert_eq!(strlcat(buf.as_mut_ptr(), c"defgh".as_ptr(), buf.len()), 8);
            assert_eq!(CStr::from_ptr(buf.as_ptr()), c"abcdefg");
        }
    }

    #[test]
    fn strlen_chk_passes_strings_that_fit() {
        assert_eq!(unsafe { __strlen_chk(c"four".as_ptr(), 5) }, 4);
    }

    #[test]
    fn strerror_r_fills_the_buffer() {
        let mut buf = [0 as c_char; 128];
        assert_eq!(unsafe { strerror_r(libc::ENOENT, buf.as_mut_ptr(), buf.len()) }, 0);
        assert!(!unsafe { CStr::from_ptr(buf.as_ptr()) }.to_bytes().is_empty());
    }
}
