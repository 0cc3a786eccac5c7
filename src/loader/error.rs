use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("elf parse error: {0}")]
    Parse(#[from] goblin::error::Error),

    #[error("not a shared object (e_type = {e_type})")]
    NotSharedObject { e_type: u16 },

    #[error("unsupported architecture: e_machine = {machine}")]
    UnsupportedArchitecture { machine: u16 },

    #[error("image is {image_bits}-bit but the host is {host_bits}-bit")]
    ClassMismatch { image_bits: u32, host_bits: u32 },

    #[error("image has no loadable segments")]
    NoLoadableSegments,

    #[error("segment at {vaddr:#x} reads {filesz:#x} bytes past the end of the file")]
    SegmentOutOfBounds { vaddr: u64, filesz: u64 },

    #[error("unresolved symbols: {}", names.join(", "))]
    UnresolvedSymbols { names: Vec<String> },

    #[error("unsupported relocation type {r_type} at {offset:#x}")]
    UnsupportedRelocation { r_type: u32, offset: u64 },

    #[error("relocation at {offset:#x} does not fit in {bits} bits (value {value:#x})")]
    RelocationOverflow { offset: u64, bits: u32, value: i64 },

    #[error("access of {len} bytes at {offset:#x} is outside the image")]
    OutOfBounds { offset: u64, len: usize },

    #[error("failed to map {len:#x} bytes: {source}")]
    Map {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to change protection at {addr:#x}: {source}")]
    Protect {
        addr: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("image does not export required entry point `{name}`")]
    MissingEntry { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
