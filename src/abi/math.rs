//! Floating point functions of `libm`, exported with the image's
//! floating point calling convention.

use libc::{c_char, c_int, c_long, c_longlong, wchar_t};

macro_rules! unary {
    ($($name:ident: $ty:ty),* $(,)?) => {
        softfp! {
            $(pub fn $name(x: $ty) -> $ty { libm::$name(x) })*
        }
    };
}

macro_rules! binary {
    ($($name:ident: $ty:ty),* $(,)?) => {
        softfp! {
            $(pub fn $name(x: $ty, y: $ty) -> $ty { libm::$name(x, y) })*
        }
    };
}

unary! {
    acos: f64, acosf: f32, acosh: f64, asin: f64, asinf: f32, asinh: f64,
    atan: f64, atanf: f32, atanh: f64, ceil: f64, ceilf: f32, cos: f64,
    cosf: f32, cosh: f64, exp: f64, expf: f32, exp2: f64, exp2f: f32,
    fabsf: f32, floor: f64, floorf: f32, log: f64, logf: f32, log10: f64,
    log10f: f32, rint: f64, rintf: f32, round: f64, roundf: f32, sin: f64,
    sinf: f32, sinh: f64, sqrt: f64, sqrtf: f32, tan: f64, tanf: f32,
    tanh: f64, trunc: f64,
}

binary! {
    atan2: f64, atan2f: f32, fmod: f64, fmodf: f32, pow: f64, powf: f32,
}

softfp! {
    pub fn ldexp(x: f64, exp: c_int) -> f64 {
        libm::ldexp(x, exp)
    }

    pub fn ldexpf(x: f32, exp: c_int) -> f32 {
        libm::ldexpf(x, exp)
    }

    pub fn lrint(x: f64) -> c_long {
        libm::rint(x) as c_long
    }

    pub fn lrintf(x: f32) -> c_long {
        libm::rintf(x) as c_long
    }

    pub fn llrint(x: f64) -> c_longlong {
        libm::rint(x) as c_longlong
    }

    pub fn llrintf(x: f32) -> c_longlong {
        libm::rintf(x) as c_longlong
    }

    pub unsafe fn frexp(x: f64, exp: *mut c_int) -> f64 {
        let (mantissa, e) = libm::frexp(x);
        if let Some(exp) = unsafe { exp.as_mut() } {
            *exp = e;
        }
        mantissa
    }

    pub unsafe fn frexpf(x: f32, exp: *mut c_int) -> f32 {
        let (mantissa, e) = libm::frexpf(x);
        if let Some(exp) = unsafe { exp.as_mut() } {
            *exp = e;
        }
        mantissa
    }

    pub unsafe fn modf(x: f64, integral: *mut f64) -> f64 {
        let (fraction, whole) = libm::modf(x);
        if let Some(integral) = unsafe { integral.as_mut() } {
            *integral = whole;
        }
        fraction
    }

    pub unsafe fn modff(x: f32, integral: *mut f32) -> f32 {
        let (fraction, whole) = libm::modff(x);
        if let Some(integral) = unsafe { integral.as_mut() } {
            *integral = whole;
        }
        fraction
    }

    pub unsafe fn sincos(x: f64, sin: *mut f64, cos: *mut f64) {
        let (s, c) = libm::sincos(x);
        unsafe {
            if let Some(sin) = sin.as_mut() {
                *sin = s;
            }
            if let Some(cos) = cos.as_mut() {
                *cos = c;
            }
        }
    }

    pub unsafe fn sincosf(x: f32, sin: *mut f32, cos: *mut f32) {
        let (s, c) = libm::sincosf(x);
        unsafe {
            if let Some(sin) = sin.as_mut() {
                *sin = s;
            }
            if let Some(cos) = cos.as_mut() {
                *cos = c;
            }
        }
    }
}

unsafe extern "C" {
    #[link_name = "strtod"]
    fn host_strtod(s: *const c_char, end: *mut *mut c_char) -> f64;
    #[link_name = "strtof"]
    fn host_strtof(s: *const c_char, end: *mut *mut c_char) -> f32;
    #[link_name = "wcstod"]
    fn host_wcstod(s: *const wchar_t, end: *mut *mut wchar_t) -> f64;
    #[link_name = "wcstof"]
    fn host_wcstof(s: *const wchar_t, end: *mut *mut wchar_t) -> f32;
}

// Parsers returning floating point values need the same convention.
softfp! {
    pub unsafe fn atof(s: *const c_char) -> f64 {
        unsafe { host_strtod(s, std::ptr::null_mut()) }
    }

    pub unsafe fn strtod(s: *const c_char, end: *mut *mut c_char) -> f64 {
        unsafe { host_strtod(s, end) }
    }

    pub unsafe fn strtof(s: *const c_char, end: *mut *mut c_char) -> f32 {
        unsafe { host_strtof(s, end) }
    }

    pub unsafe fn wcstod(s: *const wchar_t, end: *mut *mut wchar_t) -> f64 {
        unsafe { host_wcstod(s, end) }
    }

    pub unsafe fn wcstof(s: *const wchar_t, end: *mut *mut wchar_t) -> f32 {
        unsafe { host_wcstof(s, end) }
    }
}
