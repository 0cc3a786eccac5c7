use std::collections::HashMap;

use log::{debug, warn};

use super::arch::Arch;
use super::arena::Arena;
use super::error::Result;
use crate::abi::stubs::StubKind;

/// Redirects an exported function of the image to a host function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub symbol: String,
    pub target: usize,
}

impl Patch {
    pub fn new(symbol: impl Into<String>, target: usize) -> Self {
        Self {
            symbol: symbol.into(),
            target,
        }
    }
}

/// Functions of the game image that must never run on this host.
pub fn default_patches() -> Vec<Patch> {
    let zero = StubKind::Zero.address();
    vec![
        Patch::new("OPENSSL_cpuid_setup", zero),
        Patch::new("_ZN3ITF33W1W_PushLocalNotification_Manager9cancelAllEv", zero),
    ]
}

/// Writes a jump trampoline over the entry of each patched export.
/// Returns how many patches were applied; unknown names are skipped.
pub fn apply_patches(
    arch: Arch,
    arena: &mut Arena,
    exports: &HashMap<String, u64>,
    patches: &[Patch],
) -> Result<usize> {
    let mut applied = 0;
    for patch in patches {
        let Some(&value) = exports.get(&patch.symbol) else {
            warn!("patch target `{}` is not exported by the image", patch.symbol);
            continue;
        };
        let place = arena.address_of(value);
        let (start, code) = arch.trampoline(place, patch.target as u64);
        let vaddr = start.wrapping_sub(arena.bias());
        arena.write_bytes(vaddr, &code)?;
        debug!("patched {} at {:#x} -> {:#x}", patch.symbol, start, patch.target);
        applied += 1;
    }
    Ok(applied)
}
