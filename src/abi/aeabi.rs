//! ARM run-time ABI helpers (`__aeabi_*`).
//!
//! 32-bit ARM code calls these for operations the instruction set lacks.
//! Helpers returning a quotient and remainder in four registers cannot be
//! written as a Rust function and are taken from the host's own runtime on
//! ARM; the rest are implemented here with the soft-float convention.

use libc::{c_int, c_uint, c_void, size_t};

softfp! {
    pub fn __aeabi_idiv(n: c_int, d: c_int) -> c_int {
        if d == 0 { 0 } else { n.wrapping_div(d) }
    }

    pub fn __aeabi_uidiv(n: c_uint, d: c_uint) -> c_uint {
        n.checked_div(d).unwrap_or(0)
    }

    /// Quotient in the low word, remainder in the high word.
    pub fn __aeabi_idivmod(n: c_int, d: c_int) -> u64 {
        if d == 0 {
            return 0;
        }
        let (q, r) = (n.wrapping_div(d), n.wrapping_rem(d));
        (q as u32 as u64) | ((r as u32 as u64) << 32)
    }

    pub fn __aeabi_uidivmod(n: c_uint, d: c_uint) -> u64 {
        if d == 0 {
            return 0;
        }
        (n / d) as u64 | (((n % d) as u64) << 32)
    }

    pub fn __aeabi_l2d(x: i64) -> f64 {
        x as f64
    }

    pub fn __aeabi_ul2d(x: u64) -> f64 {
        x as f64
    }

    pub fn __aeabi_l2f(x: i64) -> f32 {
        x as f32
    }

    pub fn __aeabi_ul2f(x: u64) -> f32 {
        x as f32
    }

    pub fn __aeabi_d2lz(x: f64) -> i64 {
        x as i64
    }

    pub fn __aeabi_d2ulz(x: f64) -> u64 {
        x as u64
    }

    pub fn __aeabi_i2d(x: c_int) -> f64 {
        x as f64
    }

    pub fn __aeabi_dadd(a: f64, b: f64) -> f64 {
        a + b
    }

    pub fn __aeabi_dmul(a: f64, b: f64) -> f64 {
        a * b
    }

    pub fn __aeabi_ddiv(a: f64, b: f64) -> f64 {
        a / b
    }
}

pub unsafe extern "C" fn __aeabi_memcpy(dest: *mut c_void, src: *const c_void, n: size_t) {
    unsafe { libc::memcpy(dest, src, n) };
}

/// The `__aeabi_memset` family takes the length before the fill value.
pub unsafe extern "C" fn __aeabi_memset(dest: *mut c_void, n: size_t, c: c_int) {
    unsafe { libc::memset(dest, c, n) };
}

pub unsafe extern "C" fn __aeabi_memclr(dest: *mut c_void, n: size_t) {
    unsafe { libc::memset(dest, 0, n) };
}

#[cfg(target_arch = "arm")]
pub mod runtime {
    //! Helpers linked from the host's compiler runtime.

    unsafe extern "C" {
        pub fn __aeabi_ldivmod();
        pub fn __aeabi_uldivmod();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_rounds_toward_zero() {
        assert_eq!(__aeabi_idiv(-7, 2), -3);
        assert_eq!(__aeabi_uidiv(7, 2), 3);
        assert_eq!(__aeabi_idiv(1, 0), 0);
        assert_eq!(__aeabi_idiv(i32::MIN, -1), i32::MIN);
    }

    #[test]
    fn divmod_packs_quotient_low_and_remainder_high() {
        let packed = __aeabi_idivmod(-7, 2);
        assert_eq!(packed as u32 as i32, -3);
        assert_eq!((packed >> 32) as u32 as i32, -1);
        assert_eq!(__aeabi_uidivmod(17, 5), 3 | (2 << 32));
    }

    #[test]
    fn conversions_saturate_and_truncate() {
        assert_eq!(__aeabi_d2lz(-2.9), -2);
        assert_eq!(__aeabi_d2ulz(-1.0), 0);
        assert_eq!(__aeabi_ul2d(1 << 40), 1099511627776.0);
        assert_eq!(__aeabi_dmul(__aeabi_i2d(3), 0.5), 1.5);
    }

    #[test]
    fn memset_takes_the_length_first() {
        let mut buf = [1u8; 8];
        unsafe {
            __aeabi_memset(buf.as_mut_ptr() as *mut c_void, 4, 0xaa);
            __aeabi_memclr(buf.as_mut_ptr().add(6) as *mut c_void, 2);
        }
        assert_eq!(buf, [0xaa, 0xaa, 0xaa, 0xaa, 1, 1, 0, 0]);
    }
}
