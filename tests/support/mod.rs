//! Builds a minimal x86-64 shared object in memory.
//!
//! Layout (virtual address == file offset, one RWX `PT_LOAD` over the
//! whole page):
//!
//! | vaddr | contents |
//! |-------|----------|
//! | 0x040 | program headers (`PT_LOAD`, `PT_DYNAMIC`) |
//! | 0x100 | `.dynsym`: null, `host_value` (strong import), `entry`, `optional_hook` (weak import) |
//! | 0x180 | `.dynstr` |
//! | 0x1c0 | `.hash` |
//! | 0x200 | `.rela.dyn` |
//! | 0x280 | `.dynamic` |
//! | 0x340 | GOT slot for `host_value`, then the `optional_hook` pointer |
//! | 0x360 | `.init_array`: init, 0, -1 |
//! | 0x380 | counter bumped by the initializer |
//! | 0x400 | `init`: `inc qword [counter]; ret` |
//! | 0x420 | `entry`: returns `host_value() + counter` |
#![allow(dead_code)]

pub const IMAGE_SIZE: usize = 0x1000;

pub const EM_X86_64: u16 = 62;
pub const ET_DYN: u16 = 3;

pub const R_X86_64_64: u32 = 1;
pub const R_X86_64_GLOB_DAT: u32 = 6;
pub const R_X86_64_RELATIVE: u32 = 8;

const DYNSYM: usize = 0x100;
const DYNSTR: usize = 0x180;
const HASH: usize = 0x1c0;
const RELA: usize = 0x200;
const DYNAMIC: usize = 0x280;
pub const GOT: u64 = 0x340;
pub const HOOK_SLOT: u64 = 0x348;
pub const INIT_ARRAY: u64 = 0x360;
pub const COUNTER: u64 = 0x380;
pub const INIT: u64 = 0x400;
pub const ENTRY: u64 = 0x420;

const DYNSTR_BYTES: &[u8] = b"\0host_value\0entry\0optional_hook\0";
const NAME_HOST_VALUE: u32 = 1;
const NAME_ENTRY: u32 = 12;
const NAME_OPTIONAL_HOOK: u32 = 18;

const STB_GLOBAL_FUNC: u8 = 0x12;
const STB_WEAK_FUNC: u8 = 0x22;

const DT_NULL: i64 = 0;
const DT_HASH: i64 = 4;
const DT_STRTAB: i64 = 5;
const DT_SYMTAB: i64 = 6;
const DT_RELA: i64 = 7;
const DT_RELASZ: i64 = 8;
const DT_RELAENT: i64 = 9;
const DT_STRSZ: i64 = 10;
const DT_SYMENT: i64 = 11;
const DT_INIT_ARRAY: i64 = 25;
const DT_INIT_ARRAYSZ: i64 = 27;

/// Knobs for the error-path tests.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub machine: u16,
    pub e_type: u16,
    /// Relocation type used for the `optional_hook` pointer.
    pub hook_reloc: u32,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            machine: EM_X86_64,
            e_type: ET_DYN,
            hook_reloc: R_X86_64_64,
        }
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn put(&mut self, at: usize, bytes: &[u8]) {
        self.0[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn u16(&mut self, at: usize, value: u16) {
        self.put(at, &value.to_le_bytes());
    }

    fn u32(&mut self, at: usize, value: u32) {
        self.put(at, &value.to_le_bytes());
    }

    fn u64(&mut self, at: usize, value: u64) {
        self.put(at, &value.to_le_bytes());
    }

    fn program_header(&mut self, at: usize, p_type: u32, flags: u32, offset: u64, size: u64, align: u64) {
        self.u32(at, p_type);
        self.u32(at + 4, flags);
        self.u64(at + 8, offset); // p_offset
        self.u64(at + 16, offset); // p_vaddr
        self.u64(at + 24, offset); // p_paddr
        self.u64(at + 32, size); // p_filesz
        self.u64(at + 40, size); // p_memsz
        self.u64(at + 48, align);
    }

    fn symbol(&mut self, index: usize, name: u32, info: u8, shndx: u16, value: u64, size: u64) {
        let at = DYNSYM + index * 24;
        self.u32(at, name);
        self.0[at + 4] = info;
        self.0[at + 5] = 0;
        self.u16(at + 6, shndx);
        self.u64(at + 8, value);
        self.u64(at + 16, size);
    }

    fn rela(&mut self, index: usize, offset: u64, sym: u64, r_type: u32, addend: i64) {
        let at = RELA + index * 24;
        self.u64(at, offset);
        self.u64(at + 8, (sym << 32) | r_type as u64);
        self.u64(at + 16, addend as u64);
    }
}

pub fn build(spec: &ImageSpec) -> Vec<u8> {
    let mut w = Writer(vec![0; IMAGE_SIZE]);

    // ELF header
    w.put(0, &[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    w.u16(16, spec.e_type);
    w.u16(18, spec.machine);
    w.u32(20, 1); // e_version
    w.u64(32, 64); // e_phoff
    w.u16(52, 64); // e_ehsize
    w.u16(54, 56); // e_phentsize
    w.u16(56, 2); // e_phnum
    w.u16(58, 64); // e_shentsize

    let dynamic: &[(i64, u64)] = &[
        (DT_HASH, HASH as u64),
        (DT_STRTAB, DYNSTR as u64),
        (DT_SYMTAB, DYNSYM as u64),
        (DT_STRSZ, DYNSTR_BYTES.len() as u64),
        (DT_SYMENT, 24),
        (DT_RELA, RELA as u64),
        (DT_RELASZ, 3 * 24),
        (DT_RELAENT, 24),
        (DT_INIT_ARRAY, INIT_ARRAY),
        (DT_INIT_ARRAYSZ, 24),
        (DT_NULL, 0),
    ];

    w.program_header(64, 1, 7, 0, IMAGE_SIZE as u64, 0x1000);
    w.program_header(64 + 56, 2, 6, DYNAMIC as u64, (dynamic.len() * 16) as u64, 8);

    w.symbol(1, NAME_HOST_VALUE, STB_GLOBAL_FUNC, 0, 0, 0);
    w.symbol(2, NAME_ENTRY, STB_GLOBAL_FUNC, 1, ENTRY, 0x16);
    w.symbol(3, NAME_OPTIONAL_HOOK, STB_WEAK_FUNC, 0, 0, 0);
    w.put(DYNSTR, DYNSTR_BYTES);

    // one bucket, four chain entries
    w.u32(HASH, 1);
    w.u32(HASH + 4, 4);
    w.u32(HASH + 8, 1);
    w.u32(HASH + 16, 2);
    w.u32(HASH + 20, 3);

    w.rela(0, GOT, 1, R_X86_64_GLOB_DAT, 0);
    w.rela(1, INIT_ARRAY, 0, R_X86_64_RELATIVE, INIT as i64);
    w.rela(2, HOOK_SLOT, 3, spec.hook_reloc, 0);

    for (index, (tag, value)) in dynamic.iter().enumerate() {
        w.u64(DYNAMIC + index * 16, *tag as u64);
        w.u64(DYNAMIC + index * 16 + 8, *value);
    }

    // second and third .init_array entries are skipped by the loader
    w.u64(INIT_ARRAY as usize + 16, u64::MAX);

    // inc qword ptr [rip + counter]; ret
    let init = INIT as usize;
    w.put(init, &[0x48, 0xff, 0x05]);
    w.u32(init + 3, rip_displacement(INIT + 7, COUNTER));
    w.put(init + 7, &[0xc3]);

    // sub rsp, 8; call [rip + got]; add rax, [rip + counter]; add rsp, 8; ret
    let entry = ENTRY as usize;
    w.put(entry, &[0x48, 0x83, 0xec, 0x08]);
    w.put(entry + 4, &[0xff, 0x15]);
    w.u32(entry + 6, rip_displacement(ENTRY + 10, GOT));
    w.put(entry + 10, &[0x48, 0x03, 0x05]);
    w.u32(entry + 13, rip_displacement(ENTRY + 17, COUNTER));
    w.put(entry + 17, &[0x48, 0x83, 0xc4, 0x08, 0xc3]);

    w.0
}

fn rip_displacement(next_instruction: u64, target: u64) -> u32 {
    (target as i64 - next_instruction as i64) as i32 as u32
}

/// Writes the image into `dir` and returns its path.
pub fn write(dir: &std::path::Path, spec: &ImageSpec) -> std::path::PathBuf {
    let path = dir.join("libsynthetic.so");
    std::fs::write(&path, build(spec)).expect("write image");
    path
}
