//! Standard streams.
//!
//! Bionic exposes its three standard `FILE` objects as the `__sF` array and
//! code compiled against it reaches them by address. The image gets a
//! block of fake `FILE` objects instead, and the stream hooks translate any
//! pointer into that block to the matching host stream. Every other
//! `FILE *` was produced by the host `fopen` and is forwarded unchanged.

use std::ffi::CStr;
use std::ptr::addr_of;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU8;

use libc::{c_char, c_int, c_long, c_uint, c_void, off_t, size_t, FILE};
use log::trace;

use super::valist::RawVaList;

#[cfg(target_pointer_width = "64")]
pub const BIONIC_FILE_SIZE: usize = 152;
#[cfg(target_pointer_width = "32")]
pub const BIONIC_FILE_SIZE: usize = 84;

/// Backing store of the image's `__sF`.
pub static FAKE_SF: [AtomicU8; 3 * BIONIC_FILE_SIZE] = [const { AtomicU8::new(0) }; 3 * BIONIC_FILE_SIZE];

/// The `stdin`, `stdout` and `stderr` variables, each holding the address
/// of its fake stream.
#[repr(C)]
pub struct StreamTable([*const u8; 3]);

unsafe impl Sync for StreamTable {}

pub static STD_STREAMS: StreamTable = StreamTable([
    addr_of!(FAKE_SF).cast::<u8>(),
    addr_of!(FAKE_SF).cast::<u8>().wrapping_add(BIONIC_FILE_SIZE),
    addr_of!(FAKE_SF).cast::<u8>().wrapping_add(2 * BIONIC_FILE_SIZE),
]);

impl StreamTable {
    /// Address of the variable for standard stream `index`.
    pub fn slot_address(&self, index: usize) -> usize {
        &self.0[index] as *const *const u8 as usize
    }
}

#[allow(clashing_extern_declarations)]
unsafe extern "C" {
    #[link_name = "vfprintf"]
    fn host_vfprintf(stream: *mut FILE, format: *const c_char, args: RawVaList) -> c_int;
    #[link_name = "fscanf"]
    fn host_fscanf(stream: *mut FILE, format: *const c_char, ...) -> c_int;
    #[link_name = "fread"]
    fn host_fread(ptr: *mut c_void, size: size_t, count: size_t, stream: *mut FILE) -> size_t;
    #[link_name = "fgets"]
    fn host_fgets(buf: *mut c_char, n: c_int, stream: *mut FILE) -> *mut c_char;
    #[link_name = "getc"]
    fn host_getc(stream: *mut FILE) -> c_int;
    #[link_name = "ungetc"]
    fn host_ungetc(c: c_int, stream: *mut FILE) -> c_int;
    #[link_name = "getwc"]
    fn host_getwc(stream: *mut FILE) -> c_uint;
    #[link_name = "ungetwc"]
    fn host_ungetwc(c: c_uint, stream: *mut FILE) -> c_uint;
    #[link_name = "putc"]
    fn host_putc(c: c_int, stream: *mut FILE) -> c_int;
    #[link_name = "putwc"]
    fn host_putwc(c: c_uint, stream: *mut FILE) -> c_uint;
    #[link_name = "fseek"]
    fn host_fseek(stream: *mut FILE, offset: c_long, whence: c_int) -> c_int;
    #[link_name = "fseeko"]
    fn host_fseeko(stream: *mut FILE, offset: off_t, whence: c_int) -> c_int;
    #[link_name = "ftell"]
    fn host_ftell(stream: *mut FILE) -> c_long;
    #[link_name = "ftello"]
    fn host_ftello(stream: *mut FILE) -> off_t;
    #[link_name = "fsetpos"]
    fn host_fsetpos(stream: *mut FILE, pos: *const c_void) -> c_int;
    #[link_name = "feof"]
    fn host_feof(stream: *mut FILE) -> c_int;
    #[link_name = "ferror"]
    fn host_ferror(stream: *mut FILE) -> c_int;
    #[link_name = "clearerr"]
    fn host_clearerr(stream: *mut FILE);
    #[link_name = "fileno"]
    fn host_fileno(stream: *mut FILE) -> c_int;
    #[link_name = "setvbuf"]
    fn host_setvbuf(stream: *mut FILE, buf: *mut c_char, mode: c_int, size: size_t) -> c_int;
}

#[derive(Clone, Copy)]
struct HostStreams([usize; 3]);

static HOST_STREAMS: OnceLock<HostStreams> = OnceLock::new();

fn host_streams() -> HostStreams {
    *HOST_STREAMS.get_or_init(|| unsafe {
        HostStreams([
            libc::fdopen(0, c"r".as_ptr()) as usize,
            libc::fdopen(1, c"w".as_ptr()) as usize,
            libc::fdopen(2, c"w".as_ptr()) as usize,
        ])
    })
}

/// Index of the standard stream `fp` designates, if it is a fake one.
pub fn fake_index(fp: *const c_void) -> Option<usize> {
    let base = FAKE_SF.as_ptr() as usize;
    let offset = (fp as usize).checked_sub(base)?;
    let index = offset / BIONIC_FILE_SIZE;
    (index < 3).then_some(index)
}

/// Maps an image `FILE *` to the host stream to operate on.
pub fn host_stream(fp: *mut c_void) -> *mut FILE {
    match fake_index(fp) {
        Some(index) => host_streams().0[index] as *mut FILE,
        None => fp as *mut FILE,
    }
}

pub unsafe extern "C" fn fwrite(ptr: *const c_void, size: size_t, count: size_t, fp: *mut c_void) -> size_t {
    unsafe { libc::fwrite(ptr, size, count, host_stream(fp)) }
}

pub unsafe extern "C" fn fputs(s: *const c_char, fp: *mut c_void) -> c_int {
    unsafe { libc::fputs(s, host_stream(fp)) }
}

pub unsafe extern "C" fn fputc(c: c_int, fp: *mut c_void) -> c_int {
    unsafe { libc::fputc(c, host_stream(fp)) }
}

pub unsafe extern "C" fn fflush(fp: *mut c_void) -> c_int {
    if fp.is_null() {
        return unsafe { libc::fflush(std::ptr::null_mut()) };
    }
    unsafe { libc::fflush(host_stream(fp)) }
}

/// Fake streams are never closed; the host keeps its standard streams.
pub unsafe extern "C" fn fclose(fp: *mut c_void) -> c_int {
    if fake_index(fp).is_some() {
        return 0;
    }
    unsafe { libc::fclose(fp as *mut FILE) }
}

pub unsafe extern "C" fn vfprintf(fp: *mut c_void, format: *const c_char, args: RawVaList) -> c_int {
    unsafe { host_vfprintf(host_stream(fp), format, args) }
}

/// Writes the format string without substituting its arguments.
pub unsafe extern "C" fn fprintf(fp: *mut c_void, format: *const c_char) -> c_int {
    if format.is_null() {
        return -1;
    }
    let text = unsafe { CStr::from_ptr(format) };
    trace!("fprintf degraded to raw format {:?}", text);
    unsafe { libc::fputs(format, host_stream(fp)) }
}

pub unsafe extern "C" fn fread(ptr: *mut c_void, size: size_t, count: size_t, fp: *mut c_void) -> size_t {
    unsafe { host_fread(ptr, size, count, host_stream(fp)) }
}

pub unsafe extern "C" fn fgets(buf: *mut c_char, n: c_int, fp: *mut c_void) -> *mut c_char {
    unsafe { host_fgets(buf, n, host_stream(fp)) }
}

pub unsafe extern "C" fn getc(fp: *mut c_void) -> c_int {
    unsafe { host_getc(host_stream(fp)) }
}

pub unsafe extern "C" fn ungetc(c: c_int, fp: *mut c_void) -> c_int {
    unsafe { host_ungetc(c, host_stream(fp)) }
}

pub unsafe extern "C" fn getwc(fp: *mut c_void) -> c_uint {
    unsafe { host_getwc(host_stream(fp)) }
}

pub unsafe extern "C" fn ungetwc(c: c_uint, fp: *mut c_void) -> c_uint {
    unsafe { host_ungetwc(c, host_stream(fp)) }
}

pub unsafe extern "C" fn putc(c: c_int, fp: *mut c_void) -> c_int {
    unsafe { host_putc(c, host_stream(fp)) }
}

pub unsafe extern "C" fn putwc(c: c_uint, fp: *mut c_void) -> c_uint {
    unsafe { host_putwc(c, host_stream(fp)) }
}

pub unsafe extern "C" fn fseek(fp: *mut c_void, offset: c_long, whence: c_int) -> c_int {
    unsafe { host_fseek(host_stream(fp), offset, whence) }
}

pub unsafe extern "C" fn fseeko(fp: *mut c_void, offset: off_t, whence: c_int) -> c_int {
    unsafe { host_fseeko(host_stream(fp), offset, whence) }
}

pub unsafe extern "C" fn ftell(fp: *mut c_void) -> c_long {
    unsafe { host_ftell(host_stream(fp)) }
}

pub unsafe extern "C" fn ftello(fp: *mut c_void) -> off_t {
    unsafe { host_ftello(host_stream(fp)) }
}

pub unsafe extern "C" fn fsetpos(fp: *mut c_void, pos: *const c_void) -> c_int {
    unsafe { host_fsetpos(host_stream(fp), pos) }
}

pub unsafe extern "C" fn feof(fp: *mut c_void) -> c_int {
    unsafe { host_feof(host_stream(fp)) }
}

pub unsafe extern "C" fn ferror(fp: *mut c_void) -> c_int {
    unsafe { host_ferror(host_stream(fp)) }
}

pub unsafe extern "C" fn clearerr(fp: *mut c_void) {
    unsafe { host_clearerr(host_stream(fp)) }
}

pub unsafe extern "C" fn fileno(fp: *mut c_void) -> c_int {
    unsafe { host_fileno(host_stream(fp)) }
}

pub unsafe extern "C" fn setvbuf(fp: *mut c_void, buf: *mut c_char, mode: c_int, size: size_t) -> c_int {
    unsafe { host_setvbuf(host_stream(fp), buf, mode, size) }
}

/// Scan conversions only take pointers, so the first eight argument words
/// are forwarded as they are; unused ones are ignored by the host.
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn fscanf(
    fp: *mut c_void,
    format: *const c_char,
    a0: *mut c_void,
    a1: *mut c_void,
    a2: *mut c_void,
    a3: *mut c_void,
    a4: *mut c_void,
    a5: *mut c_void,
    a6: *mut c_void,
    a7: *mut c_void,
) -> c_int {
    unsafe { host_fscanf(host_stream(fp), format, a0, a1, a2, a3, a4, a5, a6, a7) }
}
