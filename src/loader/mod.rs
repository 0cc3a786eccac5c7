//! Image parser and relocator.
//!
//! Loading is one-shot and all-or-nothing: the image is parsed, mapped,
//! relocated against a [`SymbolTable`], patched, protected and flushed, or
//! an [`Error`] describes why not. Initializers run separately through
//! [`LoadedImage::initialize`].

pub mod arch;
pub mod arena;
pub mod dynsym;
pub mod error;
pub mod module;
pub mod patch;
pub mod reloc;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use goblin::elf::Elf;
use goblin::elf::dynamic::{DT_INIT, DT_INIT_ARRAY, DT_INIT_ARRAYSZ};
use goblin::elf::header::ET_DYN;
use goblin::elf::program_header::PT_LOAD;
use log::{debug, info, warn};

pub use error::{Error, Result};
pub use module::LoadedImage;
pub use patch::Patch;

use crate::symbols::SymbolTable;
use crate::types::{DynSymbol, ImageReport, Segment};
use arch::{Arch, Width};
use arena::{Arena, Protection, page_ceil, page_floor, page_size};
use reloc::{Relocation, Relocator, Target};

pub struct Loader {
    table: Arc<SymbolTable>,
    patches: Vec<Patch>,
    base: Option<usize>,
}

impl Loader {
    pub fn new(table: Arc<SymbolTable>) -> Self {
        Self {
            table,
            patches: Vec::new(),
            base: None,
        }
    }

    /// Maps the image at exactly `base` instead of wherever the kernel
    /// chooses.
    pub fn with_base(mut self, base: Option<usize>) -> Self {
        self.base = base;
        self
    }

    pub fn with_patches(mut self, patches: Vec<Patch>) -> Self {
        self.patches = patches;
        self
    }

    pub fn load(&self, path: &Path) -> Result<LoadedImage> {
        info!("loading {}", path.display());
        let bytes = read_image(path)?;
        self.load_bytes(&bytes)
    }

    pub fn load_bytes(&self, bytes: &[u8]) -> Result<LoadedImage> {
        let binary = Elf::parse(bytes)?;
        let arch = check_header(&binary)?;
        let segments = loadable_segments(&binary, bytes.len())?;

        let min_vaddr = segments.iter().map(|s| page_floor(s.vaddr)).min().unwrap_or(0);
        let max_vaddr = segments.iter().map(|s| page_ceil(s.vaddr + s.memsz)).max().unwrap_or(0);
        let mut arena = Arena::map(min_vaddr, (max_vaddr - min_vaddr) as usize, self.base)?;
        for segment in &segments {
            let start = segment.offset as usize;
            arena.write_bytes(segment.vaddr, &bytes[start..start + segment.filesz as usize])?;
        }
        info!(
            "mapped {} segments, {:#x} bytes at {:#x}",
            segments.len(),
            arena.len(),
            arena.base()
        );

        let symbols = dynsym::read_dynamic_symbols(&binary);
        let unresolved = self.relocate(arch, &binary, &symbols, &mut arena)?;

        let exports: HashMap<String, u64> = dynsym::exports(&symbols)
            .map(|sym| (sym.name.clone(), sym.value))
            .collect();
        let patched = patch::apply_patches(arch, &mut arena, &exports, &self.patches)?;
        if patched > 0 {
            info!("applied {} function patches", patched);
        }

        let initializers = collect_initializers(&binary, &arena, arch)?;
        info!("{} initializers pending", initializers.len());

        protect_segments(&arena, &segments)?;
        arch::flush_icache(arena.base() as *const u8, arena.len());

        Ok(LoadedImage::new(arch, arena, segments, exports, unresolved, initializers))
    }

    /// Applies every dynamic relocation. Returns the weak imports that were
    /// bound to 0.
    fn relocate(
        &self,
        arch: Arch,
        binary: &Elf,
        symbols: &[DynSymbol],
        arena: &mut Arena,
    ) -> Result<Vec<String>> {
        let mut missing = BTreeSet::new();
        let mut unresolved = BTreeSet::new();
        let mut relocator = Relocator::new(arch, arena);
        let mut count = 0;

        for reloc in relocations(binary) {
            let target = match symbols.get(reloc.sym) {
                None => Target::Absent,
                Some(_) if reloc.sym == 0 => Target::Absent,
                Some(sym) if sym.defined => Target::Internal {
                    value: sym.value,
                    size: sym.size,
                },
                Some(sym) => match self.table.get(&sym.name) {
                    Some(entry) => {
                        debug!("{} -> {:#x} ({:?})", sym.name, entry.address, entry.origin);
                        Target::External {
                            address: entry.address as u64,
                            size: sym.size,
                        }
                    }
                    None if sym.weak => {
                        unresolved.insert(sym.name.clone());
                        Target::Absent
                    }
                    None => {
                        missing.insert(sym.name.clone());
                        continue;
                    }
                },
            };
            relocator.apply(&reloc, target)?;
            count += 1;
        }

        if !missing.is_empty() {
            return Err(Error::UnresolvedSymbols {
                names: missing.into_iter().collect(),
            });
        }
        for name in &unresolved {
            warn!("weak import `{}` left unresolved", name);
        }
        info!("applied {} relocations", count);
        Ok(unresolved.into_iter().collect())
    }

    /// Parses an image without mapping it.
    pub fn inspect(&self, path: &Path) -> Result<ImageReport> {
        let bytes = read_image(path)?;
        let binary = Elf::parse(&bytes)?;
        if binary.header.e_type != ET_DYN {
            return Err(Error::NotSharedObject {
                e_type: binary.header.e_type,
            });
        }
        let segments = loadable_segments(&binary, bytes.len())?;
        let symbols = dynsym::read_dynamic_symbols(&binary);

        let imports: Vec<String> = dynsym::imports(&symbols).map(|sym| sym.name.clone()).collect();
        let missing = dynsym::imports(&symbols)
            .filter(|sym| !sym.weak && self.table.resolve(&sym.name).is_none())
            .map(|sym| sym.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(ImageReport {
            machine: binary.header.e_machine,
            is_64: binary.is_64,
            segments,
            exports: dynsym::exports(&symbols).count(),
            imports,
            relocations: relocations(&binary).count(),
            missing,
        })
    }
}

/// Entry point lookup for the driver.
pub fn resolve_entry(image: &LoadedImage, name: &str) -> Option<usize> {
    image.symbol(name)
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn check_header(binary: &Elf) -> Result<Arch> {
    let header = &binary.header;
    if header.e_type != ET_DYN {
        return Err(Error::NotSharedObject { e_type: header.e_type });
    }
    let arch = Arch::from_machine(header.e_machine)
        .filter(|arch| Some(*arch) == Arch::host())
        .ok_or(Error::UnsupportedArchitecture {
            machine: header.e_machine,
        })?;
    let image_bits = if binary.is_64 { 64 } else { 32 };
    let host_bits = usize::BITS;
    if image_bits != host_bits {
        return Err(Error::ClassMismatch { image_bits, host_bits });
    }
    Ok(arch)
}

fn loadable_segments(binary: &Elf, file_len: usize) -> Result<Vec<Segment>> {
    let segments: Vec<Segment> = binary
        .program_headers
        .iter()
        .filter(|ph| ph.p_type == PT_LOAD)
        .map(|ph| Segment {
            vaddr: ph.p_vaddr,
            offset: ph.p_offset,
            filesz: ph.p_filesz,
            memsz: ph.p_memsz,
            flags: Protection::from_bits_truncate(ph.p_flags),
        })
        .collect();

    if segments.is_empty() {
        return Err(Error::NoLoadableSegments);
    }
    for segment in &segments {
        let end = segment.offset.checked_add(segment.filesz);
        if end.is_none_or(|end| end > file_len as u64) || segment.filesz > segment.memsz {
            return Err(Error::SegmentOutOfBounds {
                vaddr: segment.vaddr,
                filesz: segment.filesz,
            });
        }
    }
    Ok(segments)
}

fn relocations<'a>(binary: &'a Elf) -> impl Iterator<Item = Relocation> + 'a {
    binary
        .dynrelas
        .iter()
        .chain(binary.dynrels.iter())
        .chain(binary.pltrelocs.iter())
        .map(Relocation::from)
}

fn collect_initializers(binary: &Elf, arena: &Arena, arch: Arch) -> Result<Vec<usize>> {
    let mut initializers = Vec::new();
    let Some(dynamic) = &binary.dynamic else {
        return Ok(initializers);
    };
    // Raw d_val entries: these are virtual addresses, not file offsets.
    let lookup = |tag: u64| dynamic.dyns.iter().find(|d| d.d_tag == tag).map(|d| d.d_val);

    if let Some(init) = lookup(DT_INIT).filter(|addr| *addr != 0) {
        initializers.push(arena.address_of(init) as usize);
    }

    let word = arch.word();
    let all_ones = match word {
        Width::Bits32 => u32::MAX as u64,
        Width::Bits64 => u64::MAX,
    };
    if let (Some(array), Some(size)) = (lookup(DT_INIT_ARRAY), lookup(DT_INIT_ARRAYSZ)) {
        let stride = word.bytes() as u64;
        for index in 0..size / stride {
            let entry = arena.read_word(array + index * stride, word)?;
            if entry != 0 && entry != all_ones {
                initializers.push(entry as usize);
            }
        }
    }
    Ok(initializers)
}

/// Gives every page the union of the permissions of the segments that
/// touch it.
fn protect_segments(arena: &Arena, segments: &[Segment]) -> Result<()> {
    let page = page_size() as u64;
    let mut pages: BTreeMap<u64, Protection> = BTreeMap::new();
    for segment in segments {
        let mut addr = page_floor(segment.vaddr);
        while addr < segment.vaddr + segment.memsz {
            *pages.entry(addr).or_insert(Protection::empty()) |= segment.flags;
            addr += page;
        }
    }

    // coalesce runs of contiguous pages sharing a protection
    let mut run: Option<(u64, u64, Protection)> = None;
    for (addr, prot) in pages {
        run = match run {
            Some((start, end, current)) if end == addr && current == prot => Some((start, addr + page, prot)),
            Some((start, end, current)) => {
                arena.protect(start, (end - start) as usize, current)?;
                Some((addr, addr + page, prot))
            }
            None => Some((addr, addr + page, prot)),
        };
    }
    if let Some((start, end, prot)) = run {
        arena.protect(start, (end - start) as usize, prot)?;
    }
    Ok(())
}
