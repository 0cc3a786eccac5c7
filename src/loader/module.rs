use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use super::arch::Arch;
use super::arena::Arena;
use crate::types::Segment;

/// One foreign shared object mapped into this process.
///
/// The image stays mapped for as long as the value lives; there is no
/// unload path while code from it may still run.
pub struct LoadedImage {
    arch: Arch,
    arena: Arena,
    segments: Vec<Segment>,
    /// Export name to virtual address.
    exports: HashMap<String, u64>,
    /// Weak imports nothing provided; patched to 0.
    unresolved: Vec<String>,
    /// Runtime addresses of DT_INIT and DT_INIT_ARRAY entries, in call order.
    initializers: Vec<usize>,
    initialized: AtomicBool,
}

impl LoadedImage {
    pub(crate) fn new(
        arch: Arch,
        arena: Arena,
        segments: Vec<Segment>,
        exports: HashMap<String, u64>,
        unresolved: Vec<String>,
        initializers: Vec<usize>,
    ) -> Self {
        Self {
            arch,
            arena,
            segments,
            exports,
            unresolved,
            initializers,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Runtime address of the lowest mapped page.
    pub fn base(&self) -> usize {
        self.arena.base() as usize
    }

    pub fn bias(&self) -> usize {
        self.arena.bias() as usize
    }

    pub fn size(&self) -> usize {
        self.arena.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn exports(&self) -> impl Iterator<Item = (&str, usize)> {
        self.exports
            .iter()
            .map(|(name, value)| (name.as_str(), self.arena.address_of(*value) as usize))
    }

    /// Runtime address of an exported symbol.
    pub fn symbol(&self, name: &str) -> Option<usize> {
        self.exports
            .get(name)
            .map(|value| self.arena.address_of(*value) as usize)
    }

    pub fn initializer_count(&self) -> usize {
        self.initializers.len()
    }

    /// Runs DT_INIT then every DT_INIT_ARRAY entry in file order. Later
    /// calls do nothing.
    ///
    /// # Safety
    ///
    /// Executes code from the image. The ABI layer must be installed and
    /// the image must match the host instruction set.
    pub unsafe fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        for &addr in &self.initializers {
            debug!("running initializer at {:#x}", addr);
            let init: extern "C" fn() = unsafe { std::mem::transmute(addr) };
            init();
        }
    }
}
