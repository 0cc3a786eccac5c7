//! Reading integer arguments out of a `va_list` the image passes by value
//! to the `...V` family of callbacks.
//!
//! On every supported target the value arrives as one pointer-sized
//! argument: a pointer to the argument words on 32-bit ARM, and a pointer
//! to the register save descriptor on x86-64 and AArch64.

use libc::c_void;

pub type RawVaList = *mut c_void;

#[cfg(target_arch = "x86_64")]
#[repr(C)]
#[allow(dead_code)]
struct VaListTag {
    gp_offset: u32,
    fp_offset: u32,
    overflow_arg_area: *const u8,
    reg_save_area: *const u8,
}

#[cfg(target_arch = "aarch64")]
#[repr(C)]
#[allow(dead_code)]
struct VaListTag {
    stack: *const u8,
    gr_top: *const u8,
    vr_top: *const u8,
    gr_offs: i32,
    vr_offs: i32,
}

/// Cursor over the general-purpose arguments of a `va_list`. Works on a
/// private copy so the caller's list is left untouched.
pub struct VaArgs {
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    tag: VaListTag,
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    next: *const usize,
}

impl VaArgs {
    /// # Safety
    ///
    /// `raw` must be a live `va_list` received from foreign code.
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    pub unsafe fn new(raw: RawVaList) -> Self {
        Self {
            tag: unsafe { std::ptr::read(raw as *const VaListTag) },
        }
    }

    /// # Safety
    ///
    /// `raw` must be a live `va_list` received from foreign code.
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    pub unsafe fn new(raw: RawVaList) -> Self {
        Self {
            next: raw as *const usize,
        }
    }

    /// Returns the next integer or pointer argument.
    ///
    /// # Safety
    ///
    /// The caller must not read past the arguments actually passed.
    pub unsafe fn next_word(&mut self) -> usize {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            let tag = &mut self.tag;
            if tag.gp_offset < 48 {
                let value = *(tag.reg_save_area.add(tag.gp_offset as usize) as *const usize);
                tag.gp_offset += 8;
                value
            } else {
                let value = *(tag.overflow_arg_area as *const usize);
                tag.overflow_arg_area = tag.overflow_arg_area.add(8);
                value
            }
        }

        #[cfg(target_arch = "aarch64")]
        unsafe {
            let tag = &mut self.tag;
            if tag.gr_offs < 0 {
                let value = *(tag.gr_top.offset(tag.gr_offs as isize) as *const usize);
                tag.gr_offs += 8;
                value
            } else {
                let value = *(tag.stack as *const usize);
                tag.stack = tag.stack.add(8);
                value
            }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        unsafe {
            let value = *self.next;
            self.next = self.next.add(1);
            value
        }
    }

    /// Skips `n` arguments and returns the one after them.
    ///
    /// # Safety
    ///
    /// See [`VaArgs::next_word`].
    pub unsafe fn nth_word(&mut self, n: usize) -> usize {
        for _ in 0..n {
            unsafe { self.next_word() };
        }
        unsafe { self.next_word() }
    }
}
