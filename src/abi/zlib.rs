//! zlib-compatible entry points over `miniz_oxide`.
//!
//! The image allocates its own `z_stream`; the private `state` pointer
//! holds a boxed [`StreamState`]. `zalloc`/`zfree`/`opaque` are ignored.

#![allow(non_snake_case)]

use libc::{c_char, c_int, c_uint, c_ulong, c_void};
use log::debug;
use miniz_oxide::deflate::core::{create_comp_flags_from_zip_params, CompressorOxide};
use miniz_oxide::deflate::{compress_to_vec_zlib, stream::deflate as deflate_stream};
use miniz_oxide::inflate::stream::{inflate as inflate_stream, InflateState};
use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};
use miniz_oxide::{DataFormat, MZError, MZFlush, MZStatus, StreamResult};

pub const Z_OK: c_int = 0;
pub const Z_STREAM_END: c_int = 1;
pub const Z_NEED_DICT: c_int = 2;
pub const Z_ERRNO: c_int = -1;
pub const Z_STREAM_ERROR: c_int = -2;
pub const Z_DATA_ERROR: c_int = -3;
pub const Z_MEM_ERROR: c_int = -4;
pub const Z_BUF_ERROR: c_int = -5;
pub const Z_VERSION_ERROR: c_int = -6;

pub const Z_DEFAULT_COMPRESSION: c_int = -1;
const DEFAULT_LEVEL: c_int = 6;
const MAX_WBITS: c_int = 15;

static VERSION: &std::ffi::CStr = c"1.2.11";

#[repr(C)]
pub struct ZStream {
    pub next_in: *const u8,
    pub avail_in: c_uint,
    pub total_in: c_ulong,
    pub next_out: *mut u8,
    pub avail_out: c_uint,
    pub total_out: c_ulong,
    pub msg: *const c_char,
    pub state: *mut c_void,
    pub zalloc: *mut c_void,
    pub zfree: *mut c_void,
    pub opaque: *mut c_void,
    pub data_type: c_int,
    pub adler: c_ulong,
    pub reserved: c_ulong,
}

pub enum StreamState {
    Inflate { state: Box<InflateState>, format: DataFormat },
    Deflate { state: Box<CompressorOxide> },
}

fn format_for(window_bits: c_int) -> Option<DataFormat> {
    match window_bits {
        8..=MAX_WBITS => Some(DataFormat::Zlib),
        -15..=-8 => Some(DataFormat::Raw),
        // gzip framing is not supported
        _ => None,
    }
}

const ADLER_MOD: u32 = 65521;

/// Continues an Adler-32 checksum over `data`.
pub fn adler32_update(adler: u32, data: &[u8]) -> u32 {
    let (mut a, mut b) = (adler & 0xffff, adler >> 16);
    for chunk in data.chunks(5552) {
        for byte in chunk {
            a += *byte as u32;
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xedb8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = crc_table();

/// Continues a CRC-32 (IEEE) checksum over `data`.
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    let mut c = !crc;
    for byte in data {
        c = CRC_TABLE[((c ^ *byte as u32) & 0xff) as usize] ^ (c >> 8);
    }
    !c
}

fn status_code(status: Result<MZStatus, MZError>) -> c_int {
    match status {
        Ok(MZStatus::Ok) => Z_OK,
        Ok(MZStatus::StreamEnd) => Z_STREAM_END,
        Ok(MZStatus::NeedDict) => Z_NEED_DICT,
        Err(MZError::ErrNo) => Z_ERRNO,
        Err(MZError::Stream) => Z_STREAM_ERROR,
        Err(MZError::Data) => Z_DATA_ERROR,
        Err(MZError::Mem) => Z_MEM_ERROR,
        Err(MZError::Buf) => Z_BUF_ERROR,
        Err(MZError::Version) => Z_VERSION_ERROR,
        Err(_) => Z_STREAM_ERROR,
    }
}

unsafe fn stream_state<'a>(strm: *mut ZStream) -> Option<(&'a mut ZStream, &'a mut StreamState)> {
    let strm = unsafe { strm.as_mut() }?;
    let state = unsafe { (strm.state as *mut StreamState).as_mut() }?;
    Some((strm, state))
}

unsafe fn install_state(strm: *mut ZStream, state: StreamState) -> c_int {
    let Some(strm) = (unsafe { strm.as_mut() }) else {
        return Z_STREAM_ERROR;
    };
    strm.state = Box::into_raw(Box::new(state)) as *mut c_void;
    strm.total_in = 0;
    strm.total_out = 0;
    strm.msg = std::ptr::null();
    strm.adler = 1;
    Z_OK
}

unsafe fn release_state(strm: *mut ZStream) -> c_int {
    let Some(strm) = (unsafe { strm.as_mut() }) else {
        return Z_STREAM_ERROR;
    };
    if strm.state.is_null() {
        return Z_STREAM_ERROR;
    }
    drop(unsafe { Box::from_raw(strm.state as *mut StreamState) });
    strm.state = std::ptr::null_mut();
    Z_OK
}

/// Runs one step of `step` over the stream's buffers and advances them.
unsafe fn pump(strm: &mut ZStream, step: impl FnOnce(&[u8], &mut [u8]) -> StreamResult) -> (StreamResult, usize) {
    let input: &[u8] = if strm.next_in.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(strm.next_in, strm.avail_in as usize) }
    };
    let output: &mut [u8] = if strm.next_out.is_null() {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(strm.next_out, strm.avail_out as usize) }
    };
    let start = strm.next_out;
    let result = step(input, output);

    strm.next_in = strm.next_in.wrapping_add(result.bytes_consumed);
    strm.avail_in -= result.bytes_consumed as c_uint;
    strm.total_in += result.bytes_consumed as c_ulong;
    strm.next_out = strm.next_out.wrapping_add(result.bytes_written);
    strm.avail_out -= result.bytes_written as c_uint;
    strm.total_out += result.bytes_written as c_ulong;
    (result, start as usize)
}

pub unsafe extern "C" fn inflateInit2_(
    strm: *mut ZStream,
    window_bits: c_int,
    _version: *const c_char,
    _stream_size: c_int,
) -> c_int {
    let Some(format) = format_for(window_bits) else {
        debug!("inflateInit2_: unsupported window bits {window_bits}");
        return Z_STREAM_ERROR;
    };
    let state = StreamState::Inflate {
        state: InflateState::new_boxed(format),
        format,
    };
    unsafe { install_state(strm, state) }
}

pub unsafe extern "C" fn inflateInit_(strm: *mut ZStream, version: *const c_char, stream_size: c_int) -> c_int {
    unsafe { inflateInit2_(strm, MAX_WBITS, version, stream_size) }
}

pub unsafe extern "C" fn inflate(strm: *mut ZStream, flush: c_int) -> c_int {
    let Some((strm, StreamState::Inflate { state, .. })) = (unsafe { stream_state(strm) }) else {
        return Z_STREAM_ERROR;
    };
    let Ok(flush) = MZFlush::new(flush) else {
        return Z_STREAM_ERROR;
    };
    let (result, start) = unsafe { pump(strm, |input, output| inflate_stream(state, input, output, flush)) };
    if result.bytes_written > 0 {
        let written = unsafe { std::slice::from_raw_parts(start as *const u8, result.bytes_written) };
        strm.adler = adler32_update(strm.adler as u32, written) as c_ulong;
    }
    status_code(result.status)
}

pub unsafe extern "C" fn inflateReset(strm: *mut ZStream) -> c_int {
    let Some((strm, StreamState::Inflate { state, format })) = (unsafe { stream_state(strm) }) else {
        return Z_STREAM_ERROR;
    };
    state.reset(*format);
    strm.total_in = 0;
    strm.total_out = 0;
    strm.adler = 1;
    Z_OK
}

pub unsafe extern "C" fn inflateEnd(strm: *mut ZStream) -> c_int {
    unsafe { release_state(strm) }
}

#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn deflateInit2_(
    strm: *mut ZStream,
    level: c_int,
    _method: c_int,
    window_bits: c_int,
    _mem_level: c_int,
    strategy: c_int,
    _version: *const c_char,
    _stream_size: c_int,
) -> c_int {
    let level = if level == Z_DEFAULT_COMPRESSION { DEFAULT_LEVEL } else { level };
    if !(0..=10).contains(&level) {
        return Z_STREAM_ERROR;
    }
    let Some(format) = format_for(window_bits) else {
        return Z_STREAM_ERROR;
    };
    let window_bits = match format {
        DataFormat::Raw => -MAX_WBITS,
        _ => MAX_WBITS,
    };
    let flags = create_comp_flags_from_zip_params(level, window_bits, strategy);
    let state = StreamState::Deflate {
        state: Box::new(CompressorOxide::new(flags)),
    };
    unsafe { install_state(strm, state) }
}

pub unsafe extern "C" fn deflateInit_(
    strm: *mut ZStream,
    level: c_int,
    version: *const c_char,
    stream_size: c_int,
) -> c_int {
    unsafe { deflateInit2_(strm, level, 8, MAX_WBITS, 8, 0, version, stream_size) }
}

pub unsafe extern "C" fn deflate(strm: *mut ZStream, flush: c_int) -> c_int {
    let Some((strm, StreamState::Deflate { state })) = (unsafe { stream_state(strm) }) else {
        return Z_STREAM_ERROR;
    };
    let Ok(flush) = MZFlush::new(flush) else {
        return Z_STREAM_ERROR;
    };
    let consumed_from = strm.next_in;
    let (result, _) = unsafe { pump(strm, |input, output| deflate_stream(state, input, output, flush)) };
    if result.bytes_consumed > 0 {
        let consumed = unsafe { std::slice::from_raw_parts(consumed_from, result.bytes_consumed) };
        strm.adler = adler32_update(strm.adler as u32, consumed) as c_ulong;
    }
    status_code(result.status)
}

pub unsafe extern "C" fn deflateReset(strm: *mut ZStream) -> c_int {
    let Some((strm, StreamState::Deflate { state })) = (unsafe { stream_state(strm) }) else {
        return Z_STREAM_ERROR;
    };
    state.reset();
    strm.total_in = 0;
    strm.total_out = 0;
    strm.adler = 1;
    Z_OK
}

pub unsafe extern "C" fn deflateEnd(strm: *mut ZStream) -> c_int {
    unsafe { release_state(strm) }
}

/// Worst-case size of `compress` output for `len` input bytes.
pub extern "C" fn compressBound(len: c_ulong) -> c_ulong {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13
}

pub unsafe extern "C" fn compress2(
    dest: *mut u8,
    dest_len: *mut c_ulong,
    source: *const u8,
    source_len: c_ulong,
    level: c_int,
) -> c_int {
    let level = if level == Z_DEFAULT_COMPRESSION { DEFAULT_LEVEL } else { level };
    if !(0..=10).contains(&level) {
        return Z_STREAM_ERROR;
    }
    let Some(capacity) = (unsafe { dest_len.as_mut() }) else {
        return Z_STREAM_ERROR;
    };
    let input = unsafe { raw_input(source, source_len) };
    let packed = compress_to_vec_zlib(input, level as u8);
    unsafe { deliver(&packed, dest, capacity) }
}

pub unsafe extern "C" fn compress(
    dest: *mut u8,
    dest_len: *mut c_ulong,
    source: *const u8,
    source_len: c_ulong,
) -> c_int {
    unsafe { compress2(dest, dest_len, source, source_len, Z_DEFAULT_COMPRESSION) }
}

pub unsafe extern "C" fn uncompress(
    dest: *mut u8,
    dest_len: *mut c_ulong,
    source: *const u8,
    source_len: c_ulong,
) -> c_int {
    let Some(capacity) = (unsafe { dest_len.as_mut() }) else {
        return Z_STREAM_ERROR;
    };
    let input = unsafe { raw_input(source, source_len) };
    match decompress_to_vec_zlib_with_limit(input, *capacity as usize) {
        Ok(plain) => unsafe { deliver(&plain, dest, capacity) },
        Err(err) if err.status == TINFLStatus::HasMoreOutput => Z_BUF_ERROR,
        Err(_) => Z_DATA_ERROR,
    }
}

unsafe fn raw_input<'a>(source: *const u8, len: c_ulong) -> &'a [u8] {
    if source.is_null() || len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(source, len as usize) }
}

unsafe fn deliver(data: &[u8], dest: *mut u8, capacity: &mut c_ulong) -> c_int {
    if data.len() > *capacity as usize || (dest.is_null() && !data.is_empty()) {
        return Z_BUF_ERROR;
    }
    if !data.is_empty() {
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), dest, data.len()) };
    }
    *capacity = data.len() as c_ulong;
    Z_OK
}

pub unsafe extern "C" fn crc32(crc: c_ulong, buf: *const u8, len: c_uint) -> c_ulong {
    if buf.is_null() {
        return 0;
    }
    let data = unsafe { std::slice::from_raw_parts(buf, len as usize) };
    crc32_update(crc as u32, data) as c_ulong
}

pub unsafe extern "C" fn adler32(adler: c_ulong, buf: *const u8, len: c_uint) -> c_ulong {
    if buf.is_null() {
        return 1;
    }
    let data = unsafe { std::slice::from_raw_parts(buf, len as usize) };
    adler32_update(adler as u32, data) as c_ulong
}

pub extern "C" fn zlibVersion() -> *const c_char {
    VERSION.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;

    const Z_FINISH: c_int = 4;

    fn fresh_stream() -> ZStream {
        ZStream {
            next_in: std::ptr::null(),
            avail_in: 0,
            total_in: 0,
            next_out: std::ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: std::ptr::null(),
            state: std::ptr::null_mut(),
            zalloc: std::ptr::null_mut(),
            zfree: std::ptr::null_mut(),
            opaque: std::ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        }
    }

    #[test]
    fn checksums_match_known_vectors() {
        assert_eq!(crc32_update(0, b"123456789"), 0xcbf4_3926);
        assert_eq!(adler32_update(1, b"Wikipedia"), 0x11e6_0398);
        assert_eq!(unsafe { adler32(0, std::ptr::null(), 0) }, 1);
    }

    #[test]
    fn one_shot_compression_restores_the_input() {
        let text = b"the quick brown fox jumps over the lazy dog ".repeat(20);
        let mut packed = vec![0u8; compressBound(text.len() as c_ulong) as usize];
        let mut packed_len = packed.len() as c_ulong;
        unsafe {
            assert_eq!(compress(packed.as_mut_ptr(), &mut packed_len, text.as_ptr(), text.len() as c_ulong), Z_OK);
        }
        assert!((packed_len as usize) < text.len());

        let mut plain = vec![0u8; text.len()];
        let mut plain_len = plain.len() as c_ulong;
        unsafe {
            assert_eq!(uncompress(plain.as_mut_ptr(), &mut plain_len, packed.as_ptr(), packed_len), Z_OK);
        }
        assert_eq!(plain_len as usize, text.len());
        assert_eq!(plain, text);

        let mut short = vec![0u8; 10];
        let mut short_len = short.len() as c_ulong;
        unsafe {
            assert_eq!(uncompress(short.as_mut_ptr(), &mut short_len, packed.as_ptr(), packed_len), Z_BUF_ERROR);
        }
    }

    #[test]
    fn corrupt_input_is_a_data_error() {
        let mut out = [0u8; 16];
        let mut out_len = out.len() as c_ulong;
        let garbage = [0x78u8, 0x9c, 0xff, 0xff, 0xff];
        let rc = unsafe { uncompress(out.as_mut_ptr(), &mut out_len, garbage.as_ptr(), garbage.len() as c_ulong) };
        assert_eq!(rc, Z_DATA_ERROR);
    }

    #[test]
    fn streaming_inflate_matches_one_shot_output() {
        let text = b"streamed payload ".repeat(64);
        let packed = compress_to_vec_zlib(&text, 6);

        let mut strm = fresh_stream();
        let mut out = vec![0u8; text.len() + 64];
        unsafe {
            assert_eq!(inflateInit_(&mut strm, VERSION.as_ptr(), std::mem::size_of::<ZStream>() as c_int), Z_OK);
            strm.next_in = packed.as_ptr();
            strm.avail_in = packed.len() as c_uint;
            strm.next_out = out.as_mut_ptr();
            strm.avail_out = 100;
            let mut rc = Z_OK;
            while rc == Z_OK {
                rc = inflate(&mut strm, 0);
                strm.avail_out = (out.len() - strm.total_out as usize).min(100) as c_uint;
            }
            assert_eq!(rc, Z_STREAM_END);
            assert_eq!(strm.total_out as usize, text.len());
            assert_eq!(strm.adler as u32, adler32_update(1, &text));
            assert_eq!(inflateEnd(&mut strm), Z_OK);
        }
        assert!(strm.state.is_null());
        assert_eq!(&out[..text.len()], &text[..]);
    }

    #[test]
    fn streaming_deflate_produces_a_valid_zlib_stream() {
        let text = b"deflate me please ".repeat(32);
        let mut strm = fresh_stream();
        let mut out = vec![0u8; 1024];
        unsafe {
            assert_eq!(deflateInit_(&mut strm, Z_DEFAULT_COMPRESSION, VERSION.as_ptr(), 0), Z_OK);
            strm.next_in = text.as_ptr();
            strm.avail_in = text.len() as c_uint;
            strm.next_out = out.as_mut_ptr();
            strm.avail_out = out.len() as c_uint;
            assert_eq!(deflate(&mut strm, Z_FINISH), Z_STREAM_END);
            assert_eq!(strm.avail_in, 0);
            let written = strm.total_out as usize;
            assert_eq!(deflateEnd(&mut strm), Z_OK);
            let restored = miniz_oxide::inflate::decompress_to_vec_zlib(&out[..written]).expect("valid");
            assert_eq!(restored, text);
        }
    }

    #[test]
    fn gzip_window_bits_are_rejected() {
        let mut strm = fresh_stream();
        assert_eq!(unsafe { inflateInit2_(&mut strm, 31, VERSION.as_ptr(), 0) }, Z_STREAM_ERROR);
        assert!(strm.state.is_null());
        assert_eq!(unsafe { inflate(&mut strm, 0) }, Z_STREAM_ERROR);
    }

    #[test]
    fn bound_covers_incompressible_data() {
        assert_eq!(compressBound(0), 13);
        assert!(compressBound(1 << 20) > 1 << 20);
        assert_eq!(unsafe { std::ffi::CStr::from_ptr(zlibVersion()) }, c"1.2.11");
    }
}
