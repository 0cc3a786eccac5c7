use super::{RelocKind, Width};

pub const R_ARM_NONE: u32 = 0;
/// S + A
pub const R_ARM_ABS32: u32 = 2;
/// S + A - P
pub const R_ARM_REL32: u32 = 3;
pub const R_ARM_COPY: u32 = 20;
/// S
pub const R_ARM_GLOB_DAT: u32 = 21;
/// S
pub const R_ARM_JUMP_SLOT: u32 = 22;
/// B + A
pub const R_ARM_RELATIVE: u32 = 23;

/// `ldr pc, [pc, #-4]`
const LDR_PC_LITERAL: u32 = 0xE51F_F004;
/// `ldr.w pc, [pc, #0]` as two little-endian halfwords
const THUMB_LDR_PC_LITERAL: [u8; 4] = [0xDF, 0xF8, 0x00, 0xF0];
/// Thumb `nop`
const THUMB_NOP: [u8; 2] = [0x00, 0xBF];

pub fn classify(r_type: u32) -> Option<RelocKind> {
    Some(match r_type {
        R_ARM_NONE => RelocKind::None,
        R_ARM_ABS32 => RelocKind::Absolute(Width::Bits32),
        R_ARM_REL32 => RelocKind::PcRelative(Width::Bits32),
        R_ARM_COPY => RelocKind::Copy,
        R_ARM_GLOB_DAT => RelocKind::GlobalData,
        R_ARM_JUMP_SLOT => RelocKind::JumpSlot,
        R_ARM_RELATIVE => RelocKind::Relative,
        _ => return None,
    })
}

/// Thumb functions carry bit 0 in their symbol value. The literal load
/// needs a word-aligned instruction, so a `nop` is emitted first when the
/// function starts on a halfword boundary.
pub fn trampoline(place: u64, target: u64) -> (u64, Vec<u8>) {
    let target = (target as u32).to_le_bytes();
    let mut code = Vec::with_capacity(10);

    if place & 1 == 0 {
        code.extend_from_slice(&LDR_PC_LITERAL.to_le_bytes());
        code.extend_from_slice(&target);
        return (place, code);
    }

    let start = place & !1;
    if start % 4 != 0 {
        code.extend_from_slice(&THUMB_NOP);
    }
    code.extend_from_slice(&THUMB_LDR_PC_LITERAL);
    code.extend_from_slice(&target);
    (start, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_mode_trampoline_loads_pc_from_next_word() {
        let (start, code) = trampoline(0x1000, 0xCAFE_BABE);
        assert_eq!(start, 0x1000);
        assert_eq!(code, [0x04, 0xF0, 0x1F, 0xE5, 0xBE, 0xBA, 0xFE, 0xCA]);
    }

    #[test]
    fn thumb_trampoline_on_aligned_function_has_no_padding() {
        let (start, code) = trampoline(0x2001, 0x1234_5678);
        assert_eq!(start, 0x2000);
        assert_eq!(code, [0xDF, 0xF8, 0x00, 0xF0, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn thumb_trampoline_on_halfword_boundary_is_padded() {
        let (start, code) = trampoline(0x2003, 0x1234_5678);
        assert_eq!(start, 0x2002);
        assert_eq!(&code[..2], &THUMB_NOP);
        assert_eq!(code.len(), 10);
        // literal ends up word aligned
        assert_eq!((start + 6) % 4, 0);
    }
}
