use goblin::elf::Elf;
use goblin::elf::section_header::SHN_UNDEF;
use goblin::elf::sym::{STB_WEAK, STT_FUNC, STT_GNU_IFUNC};

use crate::types::DynSymbol;

/// Reads the dynamic symbol table in index order, so relocation `r_sym`
/// values index straight into the result.
pub fn read_dynamic_symbols(binary: &Elf) -> Vec<DynSymbol> {
    binary
        .dynsyms
        .iter()
        .map(|sym| DynSymbol {
            name: binary.dynstrtab.get_at(sym.st_name).unwrap_or("").to_string(),
            value: sym.st_value,
            size: sym.st_size,
            defined: sym.st_shndx != SHN_UNDEF as usize,
            weak: sym.st_bind() == STB_WEAK,
            function: matches!(sym.st_type(), STT_FUNC | STT_GNU_IFUNC),
        })
        .collect()
}

/// Names of undefined symbols the image expects the host to provide.
pub fn imports(symbols: &[DynSymbol]) -> impl Iterator<Item = &DynSymbol> {
    symbols.iter().filter(|sym| !sym.defined && !sym.name.is_empty())
}

/// Defined, named symbols the image exports.
pub fn exports(symbols: &[DynSymbol]) -> impl Iterator<Item = &DynSymbol> {
    symbols.iter().filter(|sym| sym.defined && !sym.name.is_empty())
}
