// src/types.rs

use crate::loader::arena::Protection;

#[derive(Debug, Clone)]
pub struct DynSymbol {
    pub name: String,
    pub value: u64, // st_value; includes the Thumb bit for Thumb functions
    pub size: u64,
    pub defined: bool, // st_shndx != SHN_UNDEF
    pub weak: bool,
    pub function: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub vaddr: u64,  // p_vaddr
    pub offset: u64, // p_offset in the file
    pub filesz: u64,
    pub memsz: u64,
    pub flags: Protection,
}

/// Summary of an image produced without mapping it.
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub machine: u16,
    pub is_64: bool,
    pub segments: Vec<Segment>,
    pub exports: usize,
    pub imports: Vec<String>,
    pub relocations: usize,
    pub missing: Vec<String>, // strong imports the symbol table cannot satisfy
}
