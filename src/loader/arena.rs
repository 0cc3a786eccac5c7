use std::io::Error as IoError;
use std::ptr::NonNull;

use bitflags::bitflags;
use memmap2::MmapMut;

use super::arch::Width;
use super::error::{Error, Result};

bitflags! {
    /// Segment permissions, bit-compatible with `p_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u32 {
        const EXEC = 0x1;
        const WRITE = 0x2;
        const READ = 0x4;
    }
}

impl Protection {
    fn to_prot(self) -> libc::c_int {
        let mut prot = libc::PROT_NONE;
        if self.contains(Protection::READ) {
            prot |= libc::PROT_READ;
        }
        if self.contains(Protection::WRITE) {
            prot |= libc::PROT_WRITE;
        }
        if self.contains(Protection::EXEC) {
            prot |= libc::PROT_EXEC;
        }
        prot
    }
}

enum Backing {
    /// Anonymous mapping placed by the kernel.
    Anon(MmapMut),
    /// Anonymous mapping at a caller-chosen address.
    Fixed { ptr: NonNull<u8>, len: usize },
    /// Plain heap buffer that is never executed. `bias` is nominal.
    Detached(Vec<u8>),
}

/// One contiguous region holding every loadable segment of an image.
///
/// All accessors take image virtual addresses; the runtime address of a
/// virtual address is `bias + vaddr`.
pub struct Arena {
    backing: Backing,
    /// Page-aligned lowest virtual address covered by the arena.
    min_vaddr: u64,
    bias: u64,
}

// The raw pointer in `Backing::Fixed` is exclusively owned by the arena.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

pub fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 0x1000,
    }
}

pub fn page_floor(value: u64) -> u64 {
    value & !(page_size() as u64 - 1)
}

pub fn page_ceil(value: u64) -> u64 {
    let mask = page_size() as u64 - 1;
    (value + mask) & !mask
}

impl Arena {
    /// Maps `len` zeroed, writable bytes for the virtual range starting at
    /// `min_vaddr`. With `base` set, the arena is placed exactly there and
    /// an already occupied range is an error.
    pub fn map(min_vaddr: u64, len: usize, base: Option<usize>) -> Result<Self> {
        let (backing, start) = match base {
            None => {
                let mmap = MmapMut::map_anon(len).map_err(|source| Error::Map { len, source })?;
                let start = mmap.as_ptr() as u64;
                (Backing::Anon(mmap), start)
            }
            Some(addr) => (Self::map_fixed(addr, len)?, addr as u64),
        };

        Ok(Self {
            backing,
            min_vaddr,
            bias: start.wrapping_sub(min_vaddr),
        })
    }

    /// An arena that only stores bytes. Used to relocate an image against
    /// a bias that does not correspond to where the bytes live.
    pub fn detached(min_vaddr: u64, len: usize, bias: u64) -> Self {
        Self {
            backing: Backing::Detached(vec![0; len]),
            min_vaddr,
            bias,
        }
    }

    fn map_fixed(addr: usize, len: usize) -> Result<Backing> {
        let ptr = unsafe {
            libc::mmap(
                addr as *mut libc::c_void,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED_NOREPLACE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Error::Map {
                len,
                source: IoError::last_os_error(),
            });
        }
        // Kernels without MAP_FIXED_NOREPLACE treat it as a hint.
        if ptr as usize != addr {
            unsafe { libc::munmap(ptr, len) };
            return Err(Error::Map {
                len,
                source: IoError::from_raw_os_error(libc::EEXIST),
            });
        }
        let ptr = NonNull::new(ptr as *mut u8).ok_or(Error::Map {
            len,
            source: IoError::from_raw_os_error(libc::EINVAL),
        })?;
        Ok(Backing::Fixed { ptr, len })
    }

    fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Anon(mmap) => &mmap[..],
            Backing::Fixed { ptr, len } => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), *len) },
            Backing::Detached(buf) => &buf[..],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Anon(mmap) => &mut mmap[..],
            Backing::Fixed { ptr, len } => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), *len) },
            Backing::Detached(buf) => &mut buf[..],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load bias: runtime address minus virtual address.
    pub fn bias(&self) -> u64 {
        self.bias
    }

    /// Runtime address of the first mapped byte.
    pub fn base(&self) -> u64 {
        self.bias.wrapping_add(self.min_vaddr)
    }

    pub fn address_of(&self, vaddr: u64) -> u64 {
        self.bias.wrapping_add(vaddr)
    }

    pub fn contains(&self, vaddr: u64, len: usize) -> bool {
        self.range(vaddr, len).is_ok()
    }

    fn range(&self, vaddr: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let out_of_bounds = || Error::OutOfBounds { offset: vaddr, len };
        let start = vaddr.checked_sub(self.min_vaddr).ok_or_else(out_of_bounds)? as usize;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.len() {
            return Err(out_of_bounds());
        }
        Ok(start..end)
    }

    pub fn read_bytes(&self, vaddr: u64, len: usize) -> Result<&[u8]> {
        let range = self.range(vaddr, len)?;
        Ok(&self.bytes()[range])
    }

    pub fn write_bytes(&mut self, vaddr: u64, data: &[u8]) -> Result<()> {
        let range = self.range(vaddr, data.len())?;
        self.bytes_mut()[range].copy_from_slice(data);
        Ok(())
    }

    pub fn read_u32(&self, vaddr: u64) -> Result<u32> {
        let bytes = self.read_bytes(vaddr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&self, vaddr: u64) -> Result<u64> {
        let bytes = self.read_bytes(vaddr, 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    pub fn write_u32(&mut self, vaddr: u64, value: u32) -> Result<()> {
        self.write_bytes(vaddr, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, vaddr: u64, value: u64) -> Result<()> {
        self.write_bytes(vaddr, &value.to_le_bytes())
    }

    /// Reads a field of the given width, sign-extending 32-bit values.
    pub fn read_signed(&self, vaddr: u64, width: Width) -> Result<i64> {
        match width {
            Width::Bits32 => Ok(self.read_u32(vaddr)? as i32 as i64),
            Width::Bits64 => Ok(self.read_u64(vaddr)? as i64),
        }
    }

    pub fn read_word(&self, vaddr: u64, width: Width) -> Result<u64> {
        match width {
            Width::Bits32 => Ok(self.read_u32(vaddr)? as u64),
            Width::Bits64 => self.read_u64(vaddr),
        }
    }

    /// Writes the low `width` bits of `value`.
    pub fn write_word(&mut self, vaddr: u64, width: Width, value: u64) -> Result<()> {
        match width {
            Width::Bits32 => self.write_u32(vaddr, value as u32),
            Width::Bits64 => self.write_u64(vaddr, value),
        }
    }

    /// Changes the protection of the pages covering `[vaddr, vaddr + len)`.
    /// Detached arenas ignore the request.
    pub fn protect(&self, vaddr: u64, len: usize, prot: Protection) -> Result<()> {
        if matches!(self.backing, Backing::Detached(_)) {
            return Ok(());
        }
        let range = self.range(vaddr, len)?;
        let addr = self.base() as usize + range.start;
        let rc = unsafe { libc::mprotect(addr as *mut libc::c_void, range.len(), prot.to_prot()) };
        if rc != 0 {
            return Err(Error::Protect {
                addr,
                source: IoError::last_os_error(),
            });
        }
        Ok(())
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Backing::Fixed { ptr, len } = self.backing {
            unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, len) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_arena_addresses_follow_bias() {
        let arena = Arena::detached(0x1000, 0x2000, 0x8000_0000);
        assert_eq!(arena.address_of(0x1234), 0x8000_1234);
        assert_eq!(arena.base(), 0x8000_1000);
        assert_eq!(arena.len(), 0x2000);
    }

    #[test]
    fn accesses_outside_the_arena_are_rejected() {
        let mut arena = Arena::detached(0x1000, 0x100, 0);
        assert!(matches!(arena.read_u32(0xFFC), Err(Error::OutOfBounds { .. })));
        assert!(matches!(arena.write_u64(0x10FC, 1), Err(Error::OutOfBounds { .. })));
        assert!(arena.write_u32(0x10FC, 1).is_ok());
    }

    #[test]
    fn signed_reads_extend_32_bit_fields() {
        let mut arena = Arena::detached(0, 0x10, 0);
        arena.write_u32(0, 0xFFFF_FFF0).expect("write");
        assert_eq!(arena.read_signed(0, Width::Bits32).expect("read"), -16);
        assert_eq!(arena.read_word(0, Width::Bits32).expect("read"), 0xFFFF_FFF0);
    }

    #[test]
    fn anonymous_mapping_is_zeroed_and_writable() {
        let len = page_size();
        let mut arena = Arena::map(0x4000, len, None).expect("map");
        assert_eq!(arena.read_u64(0x4000).expect("read"), 0);
        arena.write_u64(0x4008, 0xDEAD_BEEF).expect("write");
        assert_eq!(arena.read_u64(0x4008).expect("read"), 0xDEAD_BEEF);
        assert_eq!(arena.base() as usize % len, 0);
    }
}
