use super::{RelocKind, Width};

pub const R_AARCH64_NONE: u32 = 0;
/// Legacy encoding of R_AARCH64_NONE.
pub const R_AARCH64_NONE_LEGACY: u32 = 256;
/// S + A
pub const R_AARCH64_ABS64: u32 = 257;
/// S + A - P
pub const R_AARCH64_PREL64: u32 = 260;
/// S + A - P
pub const R_AARCH64_PREL32: u32 = 261;
pub const R_AARCH64_COPY: u32 = 1024;
/// S + A
pub const R_AARCH64_GLOB_DAT: u32 = 1025;
/// S + A
pub const R_AARCH64_JUMP_SLOT: u32 = 1026;
/// B + A
pub const R_AARCH64_RELATIVE: u32 = 1027;

/// `ldr x16, #8`
const LDR_X16_LITERAL: u32 = 0x5800_0050;
/// `br x16`
const BR_X16: u32 = 0xD61F_0200;

pub fn classify(r_type: u32) -> Option<RelocKind> {
    Some(match r_type {
        R_AARCH64_NONE | R_AARCH64_NONE_LEGACY => RelocKind::None,
        R_AARCH64_ABS64 => RelocKind::Absolute(Width::Bits64),
        R_AARCH64_PREL64 => RelocKind::PcRelative(Width::Bits64),
        R_AARCH64_PREL32 => RelocKind::PcRelative(Width::Bits32),
        R_AARCH64_COPY => RelocKind::Copy,
        R_AARCH64_GLOB_DAT => RelocKind::GlobalData,
        R_AARCH64_JUMP_SLOT => RelocKind::JumpSlot,
        R_AARCH64_RELATIVE => RelocKind::Relative,
        _ => return None,
    })
}

pub fn trampoline(target: u64) -> Vec<u8> {
    let mut code = Vec::with_capacity(16);
    code.extend_from_slice(&LDR_X16_LITERAL.to_le_bytes());
    code.extend_from_slice(&BR_X16.to_le_bytes());
    code.extend_from_slice(&target.to_le_bytes());
    code
}
