//! Relocation arithmetic over an [`Arena`].

use log::trace;

use super::arch::{Arch, RelocKind, Width};
use super::arena::Arena;
use super::error::{Error, Result};

/// One relocation record, consumed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Virtual address of the patched field.
    pub offset: u64,
    pub r_type: u32,
    /// Explicit addend of RELA records; REL records read it from the field.
    pub addend: Option<i64>,
    pub sym: usize,
}

impl From<goblin::elf::Reloc> for Relocation {
    fn from(reloc: goblin::elf::Reloc) -> Self {
        Self {
            offset: reloc.r_offset,
            r_type: reloc.r_type,
            addend: reloc.r_addend,
            sym: reloc.r_sym,
        }
    }
}

/// What the symbol of a relocation resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// No symbol, or an unresolved weak reference (S = 0).
    Absent,
    /// Defined in the image; `value` is the symbol's virtual address.
    Internal { value: u64, size: u64 },
    /// Host address taken from the symbol table.
    External { address: u64, size: u64 },
}

pub struct Relocator<'a> {
    arch: Arch,
    arena: &'a mut Arena,
}

impl<'a> Relocator<'a> {
    pub fn new(arch: Arch, arena: &'a mut Arena) -> Self {
        Self { arch, arena }
    }

    fn symbol_address(&self, target: Target) -> u64 {
        match target {
            Target::Absent => 0,
            Target::Internal { value, .. } => self.arena.address_of(value),
            Target::External { address, .. } => address,
        }
    }

    fn addend(&self, reloc: &Relocation, width: Width) -> Result<i64> {
        match reloc.addend {
            Some(addend) => Ok(addend),
            None => self.arena.read_signed(reloc.offset, width),
        }
    }

    /// Applies `reloc` whose symbol resolved to `target`.
    pub fn apply(&mut self, reloc: &Relocation, target: Target) -> Result<()> {
        let kind = self.arch.classify(reloc.r_type).ok_or(Error::UnsupportedRelocation {
            r_type: reloc.r_type,
            offset: reloc.offset,
        })?;
        let word = self.arch.word();
        let s = self.symbol_address(target);
        let p = self.arena.address_of(reloc.offset);

        let value = match kind {
            RelocKind::None => return Ok(()),
            RelocKind::Copy => return self.copy(reloc, target),
            RelocKind::Absolute(width) => {
                let value = s.wrapping_add(self.addend(reloc, width)? as u64);
                self.arena.write_word(reloc.offset, width, value)?;
                value
            }
            RelocKind::PcRelative(width) => {
                let value = s.wrapping_add(self.addend(reloc, width)? as u64).wrapping_sub(p) as i64;
                if width == Width::Bits32 && word == Width::Bits64 && i32::try_from(value).is_err() {
                    return Err(Error::RelocationOverflow {
                        offset: reloc.offset,
                        bits: width.bits(),
                        value,
                    });
                }
                self.arena.write_word(reloc.offset, width, value as u64)?;
                value as u64
            }
            RelocKind::GlobalData | RelocKind::JumpSlot => {
                let value = if self.arch.slot_uses_addend() {
                    s.wrapping_add(self.addend(reloc, word)? as u64)
                } else {
                    s
                };
                self.arena.write_word(reloc.offset, word, value)?;
                value
            }
            RelocKind::Relative => {
                let value = self.arena.bias().wrapping_add(self.addend(reloc, word)? as u64);
                self.arena.write_word(reloc.offset, word, value)?;
                value
            }
        };
        trace!("{:?} at {:#x} <- {:#x}", kind, reloc.offset, value);
        Ok(())
    }

    fn copy(&mut self, reloc: &Relocation, target: Target) -> Result<()> {
        match target {
            Target::Absent => Ok(()),
            Target::Internal { value, size } => {
                let bytes = self.arena.read_bytes(value, size as usize)?.to_vec();
                self.arena.write_bytes(reloc.offset, &bytes)
            }
            Target::External { address, size } => {
                // Table addresses point at live host objects of at least `size` bytes.
                let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, size as usize) };
                self.arena.write_bytes(reloc.offset, bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARM_BIAS: u64 = 0x8000_0000;

    fn rel(offset: u64, r_type: u32) -> Relocation {
        Relocation {
            offset,
            r_type,
            addend: None,
            sym: 1,
        }
    }

    fn rela(offset: u64, r_type: u32, addend: i64) -> Relocation {
        Relocation {
            offset,
            r_type,
            addend: Some(addend),
            sym: 1,
        }
    }

    #[test]
    fn arm_abs32_adds_implicit_addend_to_internal_symbol() {
        let mut arena = Arena::detached(0, 0x100, ARM_BIAS);
        arena.write_u32(0x10, 4).expect("seed");
        Relocator::new(Arch::Arm, &mut arena)
            .apply(&rel(0x10, 2), Target::Internal { value: 0x40, size: 0 })
            .expect("apply");
        assert_eq!(arena.read_bytes(0x10, 4).expect("read"), &[0x44, 0x00, 0x00, 0x80]);
    }

    #[test]
    fn arm_abs32_external_uses_table_address() {
        let mut arena = Arena::detached(0, 0x100, ARM_BIAS);
        Relocator::new(Arch::Arm, &mut arena)
            .apply(&rel(0x20, 2), Target::External { address: 0x1234_5678, size: 0 })
            .expect("apply");
        assert_eq!(arena.read_bytes(0x20, 4).expect("read"), &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn arm_rel32_is_pc_relative() {
        let mut arena = Arena::detached(0, 0x100, ARM_BIAS);
        Relocator::new(Arch::Arm, &mut arena)
            .apply(&rel(0x20, 3), Target::External { address: ARM_BIAS + 0x10, size: 0 })
            .expect("apply");
        // 0x8000_0010 - 0x8000_0020
        assert_eq!(arena.read_u32(0x20).expect("read"), 0xFFFF_FFF0);
    }

    #[test]
    fn arm_slots_ignore_the_stored_word() {
        let mut arena = Arena::detached(0, 0x100, ARM_BIAS);
        arena.write_u32(0x30, 0xAAAA_AAAA).expect("seed");
        arena.write_u32(0x34, 0xBBBB_BBBB).expect("seed");
        let mut relocator = Relocator::new(Arch::Arm, &mut arena);
        relocator
            .apply(&rel(0x30, 21), Target::External { address: 0xCAFE_0000, size: 0 })
            .expect("glob dat");
        relocator
            .apply(&rel(0x34, 22), Target::Internal { value: 0x81, size: 0 })
            .expect("jump slot");
        assert_eq!(arena.read_u32(0x30).expect("read"), 0xCAFE_0000);
        // Thumb bit survives
        assert_eq!(arena.read_u32(0x34).expect("read"), 0x8000_0081);
    }

    #[test]
    fn arm_relative_adds_bias_to_stored_word() {
        let mut arena = Arena::detached(0, 0x100, ARM_BIAS);
        arena.write_u32(0x40, 0x64).expect("seed");
        Relocator::new(Arch::Arm, &mut arena)
            .apply(&rel(0x40, 23), Target::Absent)
            .expect("apply");
        assert_eq!(arena.read_bytes(0x40, 4).expect("read"), &[0x64, 0x00, 0x00, 0x80]);
    }

    #[test]
    fn arm_copy_pulls_bytes_from_host_object() {
        static OBJECT: [u8; 6] = *b"hello\0";
        let mut arena = Arena::detached(0, 0x100, ARM_BIAS);
        Relocator::new(Arch::Arm, &mut arena)
            .apply(
                &rel(0x50, 20),
                Target::External {
                    address: OBJECT.as_ptr() as u64,
                    size: OBJECT.len() as u64,
                },
            )
            .expect("apply");
        assert_eq!(arena.read_bytes(0x50, 6).expect("read"), b"hello\0");
    }

    #[test]
    fn x64_absolute_and_slots() {
        let bias = 0x7f00_0000_0000;
        let mut arena = Arena::detached(0, 0x100, bias);
        let mut relocator = Relocator::new(Arch::X86_64, &mut arena);
        relocator
            .apply(&rela(0x00, 1, 8), Target::External { address: 0x1000, size: 0 })
            .expect("r_x86_64_64");
        relocator
            .apply(&rela(0x08, 6, 8), Target::External { address: 0x2000, size: 0 })
            .expect("glob dat");
        relocator
            .apply(&rela(0x10, 8, 0x40), Target::Absent)
            .expect("relative");
        assert_eq!(arena.read_u64(0x00).expect("read"), 0x1008);
        // GLOB_DAT is S on x86-64
        assert_eq!(arena.read_u64(0x08).expect("read"), 0x2000);
        assert_eq!(arena.read_u64(0x10).expect("read"), bias + 0x40);
    }

    #[test]
    fn x64_pc32_checks_range() {
        let bias = 0x7f00_0000_0000;
        let mut arena = Arena::detached(0, 0x100, bias);
        let mut relocator = Relocator::new(Arch::X86_64, &mut arena);
        relocator
            .apply(&rela(0x20, 2, -4), Target::Internal { value: 0x80, size: 0 })
            .expect("near");
        assert_eq!(arena.read_u32(0x20).expect("read") as i32, 0x80 - 4 - 0x20);

        let far = Relocator::new(Arch::X86_64, &mut arena)
            .apply(&rela(0x24, 2, 0), Target::External { address: 0x1000, size: 0 });
        assert!(matches!(far, Err(Error::RelocationOverflow { bits: 32, .. })));
    }

    #[test]
    fn aarch64_slots_include_addend() {
        let bias = 0x5555_0000_0000;
        let mut arena = Arena::detached(0, 0x100, bias);
        let mut relocator = Relocator::new(Arch::AArch64, &mut arena);
        relocator
            .apply(&rela(0x00, 1025, 0x10), Target::External { address: 0x4000, size: 0 })
            .expect("glob dat");
        relocator
            .apply(&rela(0x08, 1027, 0x88), Target::Absent)
            .expect("relative");
        relocator
            .apply(&rela(0x10, 261, 0), Target::Internal { value: 0x30, size: 0 })
            .expect("prel32");
        assert_eq!(arena.read_u64(0x00).expect("read"), 0x4010);
        assert_eq!(arena.read_u64(0x08).expect("read"), bias + 0x88);
        assert_eq!(arena.read_u32(0x10).expect("read"), 0x20);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut arena = Arena::detached(0, 0x100, 0);
        let err = Relocator::new(Arch::X86_64, &mut arena)
            .apply(&rela(0x00, 37, 0), Target::Absent)
            .expect_err("irelative is unsupported");
        assert!(matches!(err, Error::UnsupportedRelocation { r_type: 37, offset: 0 }));
    }

    #[test]
    fn none_leaves_bytes_untouched() {
        let mut arena = Arena::detached(0, 0x10, 0);
        arena.write_u32(0, 0x1234).expect("seed");
        Relocator::new(Arch::Arm, &mut arena)
            .apply(&rel(0, 0), Target::Absent)
            .expect("apply");
        assert_eq!(arena.read_u32(0).expect("read"), 0x1234);
    }
}
