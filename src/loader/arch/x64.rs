use super::{RelocKind, Width};

pub const R_X86_64_NONE: u32 = 0;
/// S + A | u64
pub const R_X86_64_64: u32 = 1;
/// S + A - P | u32
pub const R_X86_64_PC32: u32 = 2;
pub const R_X86_64_COPY: u32 = 5;
/// S | u64
pub const R_X86_64_GLOB_DAT: u32 = 6;
/// S | u64
pub const R_X86_64_JUMP_SLOT: u32 = 7;
/// B + A | u64
pub const R_X86_64_RELATIVE: u32 = 8;
/// S + A - P | u64
pub const R_X86_64_PC64: u32 = 24;

pub fn classify(r_type: u32) -> Option<RelocKind> {
    Some(match r_type {
        R_X86_64_NONE => RelocKind::None,
        R_X86_64_64 => RelocKind::Absolute(Width::Bits64),
        R_X86_64_PC32 => RelocKind::PcRelative(Width::Bits32),
        R_X86_64_COPY => RelocKind::Copy,
        R_X86_64_GLOB_DAT => RelocKind::GlobalData,
        R_X86_64_JUMP_SLOT => RelocKind::JumpSlot,
        R_X86_64_RELATIVE => RelocKind::Relative,
        R_X86_64_PC64 => RelocKind::PcRelative(Width::Bits64),
        _ => return None,
    })
}

/// `movabs rax, target; jmp rax`
pub fn trampoline(target: u64) -> Vec<u8> {
    let mut code = Vec::with_capacity(12);
    code.extend_from_slice(&[0x48, 0xB8]);
    code.extend_from_slice(&target.to_le_bytes());
    code.extend_from_slice(&[0xFF, 0xE0]);
    code
}
