//! Per-architecture relocation numbering, jump trampolines and cache
//! maintenance.
//!
//! The loaded image must match the host instruction set; the relocation
//! tables for the other architectures are still available so images can
//! be inspected (and relocations unit-tested) on any host.

mod aarch64;
mod arm;
mod x64;

use goblin::elf::header::{EM_AARCH64, EM_ARM, EM_X86_64};

/// Width of a patched field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Bits32,
    Bits64,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Bits32 => 4,
            Width::Bits64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }
}

/// Architecture-neutral classification of a relocation record.
///
/// `S` is the symbol address, `A` the addend, `B` the load bias and `P`
/// the address of the patched field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    None,
    /// S + A
    Absolute(Width),
    /// S + A - P
    PcRelative(Width),
    /// S (+ A on RELA architectures)
    GlobalData,
    /// S (+ A on RELA architectures)
    JumpSlot,
    /// B + A
    Relative,
    /// copy `st_size` bytes from S to P
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Arm,
    AArch64,
    X86_64,
}

impl Arch {
    pub fn from_machine(machine: u16) -> Option<Self> {
        match machine {
            EM_ARM => Some(Arch::Arm),
            EM_AARCH64 => Some(Arch::AArch64),
            EM_X86_64 => Some(Arch::X86_64),
            _ => None,
        }
    }

    pub fn host() -> Option<Self> {
        if cfg!(target_arch = "arm") {
            Some(Arch::Arm)
        } else if cfg!(target_arch = "aarch64") {
            Some(Arch::AArch64)
        } else if cfg!(target_arch = "x86_64") {
            Some(Arch::X86_64)
        } else {
            None
        }
    }

    pub fn machine(self) -> u16 {
        match self {
            Arch::Arm => EM_ARM,
            Arch::AArch64 => EM_AARCH64,
            Arch::X86_64 => EM_X86_64,
        }
    }

    pub fn word(self) -> Width {
        match self {
            Arch::Arm => Width::Bits32,
            Arch::AArch64 | Arch::X86_64 => Width::Bits64,
        }
    }

    pub fn classify(self, r_type: u32) -> Option<RelocKind> {
        match self {
            Arch::Arm => arm::classify(r_type),
            Arch::AArch64 => aarch64::classify(r_type),
            Arch::X86_64 => x64::classify(r_type),
        }
    }

    /// GLOB_DAT and JUMP_SLOT add the explicit addend on these targets.
    pub fn slot_uses_addend(self) -> bool {
        matches!(self, Arch::AArch64)
    }

    /// Encodes an absolute jump to `target` meant to be written over the
    /// function whose symbol value is `place`. Returns the address at which
    /// the encoding starts, which differs from `place` for Thumb symbols.
    pub fn trampoline(self, place: u64, target: u64) -> (u64, Vec<u8>) {
        match self {
            Arch::Arm => arm::trampoline(place, target),
            Arch::AArch64 => (place, aarch64::trampoline(target)),
            Arch::X86_64 => (place, x64::trampoline(target)),
        }
    }
}

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
unsafe extern "C" {
    fn __clear_cache(begin: *mut libc::c_char, end: *mut libc::c_char);
}

/// Makes freshly written code visible to instruction fetch.
pub fn flush_icache(start: *const u8, len: usize) {
    #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
    unsafe {
        let begin = start as *mut libc::c_char;
        __clear_cache(begin, begin.add(len));
    }

    // x86 keeps instruction and data caches coherent.
    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    let _ = (start, len);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_round_trips_for_supported_targets() {
        for arch in [Arch::Arm, Arch::AArch64, Arch::X86_64] {
            assert_eq!(Arch::from_machine(arch.machine()), Some(arch));
        }
        assert_eq!(Arch::from_machine(0x3), None); // EM_386
    }

    #[test]
    fn word_width_follows_class() {
        assert_eq!(Arch::Arm.word(), Width::Bits32);
        assert_eq!(Arch::X86_64.word().bytes(), 8);
    }

    #[test]
    fn unknown_relocation_types_are_not_classified() {
        assert_eq!(Arch::Arm.classify(0xff), None);
        assert_eq!(Arch::X86_64.classify(37), None); // IRELATIVE
        assert_eq!(Arch::AArch64.classify(1032), None); // IRELATIVE
    }
}
